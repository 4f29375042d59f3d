//! Learner interaction log (§3 Response).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::atom::AtomId;

/// Raw FSRS review grade, either supplied directly or inferred from a
/// [`Response`] (§4.I "Grade inference from raw response").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewGrade {
    Again,
    Hard,
    Good,
    Easy,
}

/// An append-only learner interaction record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub atom_id: AtomId,
    /// The atom's section at record time, so `history_for_section` doesn't
    /// need a join back through the canonical store.
    pub section_id: Option<String>,
    pub is_correct: bool,
    pub response_time_ms: u32,
    pub hint_used: bool,
    pub chosen_option: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub session_id: Uuid,
}

impl Response {
    /// Infers an FSRS grade from the raw signal (§4.I):
    /// incorrect → Again; correct with a hint → Hard; correct and fast
    /// (< 2000ms) → Easy; otherwise Good.
    pub fn inferred_grade(&self) -> ReviewGrade {
        if !self.is_correct {
            return ReviewGrade::Again;
        }
        if self.hint_used {
            return ReviewGrade::Hard;
        }
        if self.response_time_ms < 2000 {
            return ReviewGrade::Easy;
        }
        ReviewGrade::Good
    }
}
