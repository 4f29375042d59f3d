//! Canonical content types (§3 Atom, Section).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity for a canonical atom.
pub type AtomId = Uuid;

/// Tagged variant over atom kinds (§9 "Polymorphism over atom kinds").
/// New kinds register a `(type, analyzer)` pair rather than growing a class
/// hierarchy; the Analyzer and Interleaver both dispatch on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomType {
    Flashcard,
    Cloze,
    Mcq,
    TrueFalse,
    Matching,
    Parsons,
    Numeric,
}

impl AtomType {
    pub const ALL: [AtomType; 7] = [
        AtomType::Flashcard,
        AtomType::Cloze,
        AtomType::Mcq,
        AtomType::TrueFalse,
        AtomType::Matching,
        AtomType::Parsons,
        AtomType::Numeric,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeType {
    Declarative,
    Procedural,
    Applicative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityGrade {
    F,
    D,
    C,
    B,
    A,
}

impl QualityGrade {
    /// Grade bands per §4.E: A ≥ 90, B ≥ 75, C ≥ 60, D ≥ 40, else F.
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=100 => QualityGrade::A,
            75..=89 => QualityGrade::B,
            60..=74 => QualityGrade::C,
            40..=59 => QualityGrade::D,
            _ => QualityGrade::F,
        }
    }

    pub fn needs_rewrite(self) -> bool {
        matches!(self, QualityGrade::D | QualityGrade::F)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityIssue {
    EnumerationDetected,
    MultipleFacts,
    BackVerbose,
    FrontTooLong,
    BackTooLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomSource {
    Notion,
    Anki,
    AiGenerated,
    Manual,
}

/// FSRS memory state (§4.I). `retrievability` is always recomputed from
/// `last_review`/`stability_days` and the current time; it is never trusted
/// stale without those inputs (§3 invariant).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FsrsState {
    pub stability_days: f32,
    pub difficulty: f32,
    pub retrievability: f32,
    pub review_count: u32,
    pub lapses: u32,
    pub last_review: Option<DateTime<Utc>>,
    pub next_review: Option<DateTime<Utc>>,
}

impl FsrsState {
    /// A brand-new atom: no review history, schedules immediately.
    pub fn new() -> Self {
        Self {
            stability_days: 0.0,
            difficulty: 0.3,
            retrievability: 0.0,
            review_count: 0,
            lapses: 0,
            last_review: None,
            next_review: None,
        }
    }
}

impl Default for FsrsState {
    fn default() -> Self {
        Self::new()
    }
}

/// Derived / workflow flags (§3, plus `is_verbose` per §4.E `BACK_VERBOSE`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AtomFlags {
    pub is_atomic: bool,
    pub is_verbose: bool,
    pub needs_split: bool,
    pub needs_rewrite: bool,
    pub needs_review: bool,
}

/// The canonical, immutable-identity learning unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    pub atom_id: AtomId,
    pub front: String,
    pub back: String,
    pub atom_type: AtomType,
    pub section_id: Option<String>,
    pub concept_ids: BTreeSet<String>,
    pub knowledge_type: KnowledgeType,
    pub difficulty: f32,
    pub quality_grade: QualityGrade,
    pub quality_score: u8,
    pub quality_issues: Vec<QualityIssue>,
    pub source: AtomSource,
    pub source_ref: String,
    pub fsrs_state: FsrsState,
    pub flags: AtomFlags,
    /// Set when a `split` review approval supersedes this atom (§3, §4.G).
    /// Superseded atoms are excluded from scheduling but kept for history.
    pub superseded_by: Option<AtomId>,
    /// Optimistic-lock version (§5 "Review-queue approvals are serialized").
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Atom {
    /// An atom is eligible for scheduling iff it hasn't been superseded.
    pub fn is_schedulable(&self) -> bool {
        self.superseded_by.is_none()
    }
}

/// Hierarchical curriculum node (§3 Section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub section_id: String,
    pub parent_section_id: Option<String>,
    pub level: u8,
    pub display_order: i32,
    pub title: String,
}
