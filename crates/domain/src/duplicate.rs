//! Duplicate detection types (§3 DuplicateGroup, §4.F).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::atom::AtomId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateMethod {
    Exact,
    Fuzzy,
    Semantic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateStatus {
    Open,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub id: Uuid,
    pub atom_ids: Vec<AtomId>,
    pub method: DuplicateMethod,
    pub similarity: f64,
    pub status: DuplicateStatus,
    pub canonical_atom_id: Option<AtomId>,
}

impl DuplicateGroup {
    /// Pairs of atoms in the group, each `(lower_id, higher_id)` so that
    /// symmetry (P4) holds trivially: both orderings of a pair map to the
    /// same group.
    pub fn pairs(&self) -> Vec<(AtomId, AtomId)> {
        let mut ids = self.atom_ids.clone();
        ids.sort();
        let mut out = Vec::new();
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                out.push((ids[i], ids[j]));
            }
        }
        out
    }
}
