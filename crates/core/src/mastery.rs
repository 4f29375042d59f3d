//! Mastery Aggregator (§4.H): rolls per-atom FSRS state and response history
//! up into per-section statistics, and flags sections needing remediation.

use std::collections::HashMap;

use cortex_domain::atom::{Atom, AtomType};
use cortex_domain::response::Response;

pub const MASTERED_RETRIEVABILITY: f32 = 0.90;
pub const MASTERED_MAX_LAPSES: u32 = 2;
pub const MASTERED_MIN_REVIEWS: u32 = 3;

pub const REMEDIATION_MIN_RETRIEVABILITY: f32 = 0.70;
pub const REMEDIATION_MAX_LAPSES: f32 = 3.0;
pub const REMEDIATION_MIN_MCQ_ACCURACY: f32 = 0.80;
pub const REMEDIATION_SCORE_THRESHOLD: f32 = 0.75;

#[derive(Debug, Clone, Default)]
pub struct SectionMastery {
    pub section_id: String,
    pub avg_retrievability: f32,
    pub avg_lapses: f32,
    pub atoms_new: u32,
    pub atoms_learning: u32,
    pub atoms_mastered: u32,
    pub atoms_struggling: u32,
    pub mcq_accuracy: f32,
    pub parsons_accuracy: f32,
    pub needs_remediation: bool,
    pub remediation_score: f32,
}

fn is_mastered(atom: &Atom) -> bool {
    atom.fsrs_state.retrievability >= MASTERED_RETRIEVABILITY
        && atom.fsrs_state.lapses < MASTERED_MAX_LAPSES
        && atom.fsrs_state.review_count >= MASTERED_MIN_REVIEWS
}

fn is_struggling(atom: &Atom) -> bool {
    atom.fsrs_state.lapses >= MASTERED_MAX_LAPSES && atom.fsrs_state.review_count > 0
}

fn is_new(atom: &Atom) -> bool {
    atom.fsrs_state.review_count == 0
}

fn accuracy_for_type(
    atoms: &[&Atom],
    responses_by_atom: &HashMap<cortex_domain::atom::AtomId, Vec<&Response>>,
    atom_type: AtomType,
) -> f32 {
    let mut correct = 0u32;
    let mut total = 0u32;
    for atom in atoms.iter().filter(|a| a.atom_type == atom_type) {
        if let Some(responses) = responses_by_atom.get(&atom.atom_id) {
            for r in responses {
                total += 1;
                if r.is_correct {
                    correct += 1;
                }
            }
        }
    }
    if total == 0 {
        1.0
    } else {
        correct as f32 / total as f32
    }
}

/// Computes leaf-level statistics for one section's atoms. Does not roll up
/// to parents; see [`roll_up`] for that.
pub fn compute_section(section_id: &str, atoms: &[&Atom], responses: &[&Response]) -> SectionMastery {
    let mut responses_by_atom: HashMap<cortex_domain::atom::AtomId, Vec<&Response>> = HashMap::new();
    for r in responses {
        responses_by_atom.entry(r.atom_id).or_default().push(r);
    }

    let n = atoms.len().max(1) as f32;
    let avg_retrievability = atoms.iter().map(|a| a.fsrs_state.retrievability).sum::<f32>() / n;
    let avg_lapses = atoms.iter().map(|a| a.fsrs_state.lapses as f32).sum::<f32>() / n;

    let atoms_new = atoms.iter().filter(|a| is_new(a)).count() as u32;
    let atoms_mastered = atoms.iter().filter(|a| is_mastered(a)).count() as u32;
    let atoms_struggling = atoms.iter().filter(|a| is_struggling(a)).count() as u32;
    let atoms_learning = (atoms.len() as u32)
        .saturating_sub(atoms_new)
        .saturating_sub(atoms_mastered)
        .saturating_sub(atoms_struggling);

    let mcq_accuracy = accuracy_for_type(atoms, &responses_by_atom, AtomType::Mcq);
    let parsons_accuracy = accuracy_for_type(atoms, &responses_by_atom, AtomType::Parsons);

    let needs_remediation = avg_retrievability < REMEDIATION_MIN_RETRIEVABILITY
        || avg_lapses > REMEDIATION_MAX_LAPSES
        || mcq_accuracy < REMEDIATION_MIN_MCQ_ACCURACY;

    let normalized_lapses = (avg_lapses / REMEDIATION_MAX_LAPSES).min(1.0);
    let remediation_score = 0.40 * avg_retrievability
        + 0.25 * (1.0 - normalized_lapses)
        + 0.25 * mcq_accuracy
        + 0.10 * parsons_accuracy;

    SectionMastery {
        section_id: section_id.to_string(),
        avg_retrievability,
        avg_lapses,
        atoms_new,
        atoms_learning,
        atoms_mastered,
        atoms_struggling,
        mcq_accuracy,
        parsons_accuracy,
        needs_remediation,
        remediation_score,
    }
}

/// True when a section's computed remediation score falls below the
/// flagging threshold (§4.H).
pub fn needs_remediation_flag(score: f32) -> bool {
    score < REMEDIATION_SCORE_THRESHOLD
}

/// Rolls leaf section stats up to an ancestor by atom-weighted average,
/// given each leaf's atom count and the leaf stats themselves.
pub fn roll_up(parent_section_id: &str, children: &[(SectionMastery, u32)]) -> SectionMastery {
    let total_atoms: u32 = children.iter().map(|(_, n)| *n).sum();
    if total_atoms == 0 {
        return SectionMastery {
            section_id: parent_section_id.to_string(),
            ..Default::default()
        };
    }
    let weight = |n: u32| n as f32 / total_atoms as f32;

    let avg_retrievability = children
        .iter()
        .map(|(s, n)| s.avg_retrievability * weight(*n))
        .sum();
    let avg_lapses = children.iter().map(|(s, n)| s.avg_lapses * weight(*n)).sum();
    let mcq_accuracy = children.iter().map(|(s, n)| s.mcq_accuracy * weight(*n)).sum();
    let parsons_accuracy = children
        .iter()
        .map(|(s, n)| s.parsons_accuracy * weight(*n))
        .sum();
    let remediation_score = children
        .iter()
        .map(|(s, n)| s.remediation_score * weight(*n))
        .sum();

    SectionMastery {
        section_id: parent_section_id.to_string(),
        avg_retrievability,
        avg_lapses,
        atoms_new: children.iter().map(|(s, _)| s.atoms_new).sum(),
        atoms_learning: children.iter().map(|(s, _)| s.atoms_learning).sum(),
        atoms_mastered: children.iter().map(|(s, _)| s.atoms_mastered).sum(),
        atoms_struggling: children.iter().map(|(s, _)| s.atoms_struggling).sum(),
        mcq_accuracy,
        parsons_accuracy,
        needs_remediation: avg_retrievability < REMEDIATION_MIN_RETRIEVABILITY
            || avg_lapses > REMEDIATION_MAX_LAPSES
            || mcq_accuracy < REMEDIATION_MIN_MCQ_ACCURACY,
        remediation_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_domain::atom::{AtomFlags, AtomSource, FsrsState, KnowledgeType, QualityGrade};
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn atom_with(retrievability: f32, lapses: u32, review_count: u32, atom_type: AtomType) -> Atom {
        Atom {
            atom_id: Uuid::new_v4(),
            front: "f".to_string(),
            back: "b".to_string(),
            atom_type,
            section_id: Some("sec-1".to_string()),
            concept_ids: BTreeSet::new(),
            knowledge_type: KnowledgeType::Declarative,
            difficulty: 0.3,
            quality_grade: QualityGrade::A,
            quality_score: 100,
            quality_issues: vec![],
            source: AtomSource::Manual,
            source_ref: "ref".to_string(),
            fsrs_state: FsrsState {
                retrievability,
                lapses,
                review_count,
                ..FsrsState::new()
            },
            flags: AtomFlags::default(),
            superseded_by: None,
            version: 1,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_mastered_atom_classification() {
        let atom = atom_with(0.95, 0, 5, AtomType::Flashcard);
        assert!(is_mastered(&atom));
        assert!(!is_struggling(&atom));
    }

    #[test]
    fn test_struggling_atom_classification() {
        let atom = atom_with(0.5, 3, 4, AtomType::Flashcard);
        assert!(is_struggling(&atom));
        assert!(!is_mastered(&atom));
    }

    #[test]
    fn test_needs_remediation_on_low_retrievability() {
        let atoms = vec![atom_with(0.5, 0, 2, AtomType::Flashcard)];
        let refs: Vec<&Atom> = atoms.iter().collect();
        let stats = compute_section("sec-1", &refs, &[]);
        assert!(stats.needs_remediation);
    }

    #[test]
    fn test_no_remediation_when_healthy() {
        let atoms = vec![
            atom_with(0.95, 0, 5, AtomType::Flashcard),
            atom_with(0.92, 1, 4, AtomType::Mcq),
        ];
        let refs: Vec<&Atom> = atoms.iter().collect();
        let stats = compute_section("sec-1", &refs, &[]);
        assert!(!stats.needs_remediation);
    }

    #[test]
    fn test_roll_up_weights_by_atom_count() {
        let child_a = SectionMastery {
            avg_retrievability: 0.9,
            ..Default::default()
        };
        let child_b = SectionMastery {
            avg_retrievability: 0.5,
            ..Default::default()
        };
        let parent = roll_up("root", &[(child_a, 1), (child_b, 3)]);
        assert!((parent.avg_retrievability - 0.6).abs() < 0.01);
    }

    #[test]
    fn test_remediation_score_below_threshold_flags() {
        assert!(needs_remediation_flag(0.5));
        assert!(!needs_remediation_flag(0.9));
    }
}
