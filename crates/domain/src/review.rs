//! Rewriter review queue types (§3 ReviewQueueItem, §4.G).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::atom::{AtomId, QualityGrade, QualityIssue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteType {
    Improve,
    Split,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
    Edited,
    /// The LLM provider was unavailable when this item was enqueued (§4.G, §7).
    Error,
}

/// One proposed replacement for a `split` rewrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitSuggestion {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewQueueItem {
    pub id: Uuid,
    pub source_atom_id: AtomId,
    pub rewrite_type: RewriteType,
    pub suggested_front: Option<String>,
    pub suggested_back: Option<String>,
    pub split_suggestions: Vec<SplitSuggestion>,
    pub original_issues: Vec<QualityIssue>,
    pub estimated_new_grade: Option<QualityGrade>,
    pub status: ReviewStatus,
    pub reviewer_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl ReviewQueueItem {
    pub fn new_improve(
        source_atom_id: AtomId,
        original_issues: Vec<QualityIssue>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_atom_id,
            rewrite_type: RewriteType::Improve,
            suggested_front: None,
            suggested_back: None,
            split_suggestions: Vec::new(),
            original_issues,
            estimated_new_grade: None,
            status: ReviewStatus::Pending,
            reviewer_note: None,
            created_at: now,
            reviewed_at: None,
        }
    }

    pub fn new_split(
        source_atom_id: AtomId,
        original_issues: Vec<QualityIssue>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            rewrite_type: RewriteType::Split,
            ..Self::new_improve(source_atom_id, original_issues, now)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct AutoApproveRequest {
    pub min_improvement_pct: f32,
}
