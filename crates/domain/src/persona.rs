//! Derived learner profile and struggle signals (§3 LearnerPersona, StruggleSignal).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::atom::KnowledgeType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingSpeed {
    FastAccurate,
    FastInaccurate,
    SlowAccurate,
    SlowInaccurate,
}

/// EMA-updated profile of a single learner (§3, §4.K).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerPersona {
    pub strengths: HashMap<KnowledgeType, f32>,
    pub effectiveness: HashMap<String, f32>,
    pub processing_speed: ProcessingSpeed,
    pub chronotype: Option<String>,
    pub calibration_score: f32,
    pub interference_prone_topics: Vec<String>,
}

impl LearnerPersona {
    pub fn new() -> Self {
        Self {
            strengths: HashMap::new(),
            effectiveness: HashMap::new(),
            processing_speed: ProcessingSpeed::SlowAccurate,
            chronotype: None,
            calibration_score: 0.5,
            interference_prone_topics: Vec::new(),
        }
    }

    /// Exponential moving average update: `x' = 0.9*x + 0.1*observed` (§4.K).
    pub fn ema_update(current: f32, observed: f32) -> f32 {
        0.9 * current + 0.1 * observed
    }
}

impl Default for LearnerPersona {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-section remediation signal rebuilt on each sync or session close (§4.H).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StruggleSignal {
    pub section_id: String,
    pub avg_retrievability: f32,
    pub avg_lapses: f32,
    pub mcq_accuracy: f32,
    pub parsons_accuracy: f32,
    pub needs_remediation: bool,
    pub reason: String,
}
