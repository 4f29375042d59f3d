//! Transform (§4.D): maps staged records to canonical atoms. Idempotent by
//! `(source, source_ref)` upsert key — re-running on the same staging state
//! must not create duplicate atoms or scramble existing FSRS state.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use cortex_domain::atom::{Atom, AtomSource, AtomType, FsrsState, KnowledgeType, QualityGrade};
use cortex_ports::StagingRecord;
use uuid::Uuid;

pub struct TransformOutcome {
    pub atoms: Vec<Atom>,
    pub warnings: Vec<String>,
    pub skipped: u32,
}

fn parse_atom_type(value: Option<&str>) -> AtomType {
    match value {
        Some("cloze") => AtomType::Cloze,
        Some("mcq") => AtomType::Mcq,
        Some("true_false") => AtomType::TrueFalse,
        Some("matching") => AtomType::Matching,
        Some("parsons") => AtomType::Parsons,
        Some("numeric") => AtomType::Numeric,
        _ => AtomType::Flashcard,
    }
}

fn parse_knowledge_type(value: Option<&str>) -> KnowledgeType {
    match value {
        Some("procedural") => KnowledgeType::Procedural,
        Some("applicative") => KnowledgeType::Applicative,
        _ => KnowledgeType::Declarative,
    }
}

/// Maps one staged record into a canonical atom, or `None` with a warning
/// when a required field is missing (§4.D "skipped with a warning, never
/// aborting"). `existing` is the previously-transformed atom at this
/// `source_ref`, if any, so FSRS state and identity survive re-transforms.
fn transform_one(
    record: &StagingRecord,
    source: AtomSource,
    existing: Option<&Atom>,
    now: DateTime<Utc>,
) -> Result<Atom, String> {
    let props = &record.properties;
    let front = props
        .get("front")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let back = props
        .get("back")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let (front, back) = match (front, back) {
        (Some(f), Some(b)) => (f.to_string(), b.to_string()),
        _ => {
            return Err(format!(
                "{}: missing required front/back field",
                record.external_id
            ))
        }
    };

    let atom_type = parse_atom_type(props.get("type").and_then(|v| v.as_str()));
    let knowledge_type = parse_knowledge_type(props.get("knowledge_type").and_then(|v| v.as_str()));
    let section_id = props
        .get("section_id")
        .and_then(|v| v.as_str())
        .map(String::from);
    let concept_ids: BTreeSet<String> = props
        .get("concept_ids")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    let difficulty = props
        .get("difficulty")
        .and_then(|v| v.as_f64())
        .map(|d| d as f32)
        .unwrap_or(0.3);

    match existing {
        Some(prior) => Ok(Atom {
            atom_id: prior.atom_id,
            front,
            back,
            atom_type,
            section_id,
            concept_ids,
            knowledge_type,
            difficulty,
            // Quality grading happens in the Analyze stage; Transform leaves
            // an existing grade alone and seeds a fresh atom as ungraded.
            quality_grade: prior.quality_grade,
            quality_score: prior.quality_score,
            quality_issues: prior.quality_issues.clone(),
            source,
            source_ref: record.external_id.clone(),
            fsrs_state: prior.fsrs_state,
            flags: prior.flags,
            superseded_by: prior.superseded_by,
            version: prior.version + 1,
            created_at: prior.created_at,
            updated_at: now,
        }),
        None => Ok(Atom {
            atom_id: Uuid::new_v4(),
            front,
            back,
            atom_type,
            section_id,
            concept_ids,
            knowledge_type,
            difficulty,
            quality_grade: QualityGrade::F,
            quality_score: 0,
            quality_issues: Vec::new(),
            source,
            source_ref: record.external_id.clone(),
            fsrs_state: FsrsState::new(),
            flags: Default::default(),
            superseded_by: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }),
    }
}

/// Transforms a batch of staged records, skipping malformed rows with a
/// warning rather than aborting the whole batch (§4.D). `lookup` resolves
/// an existing atom at the same `(source, source_ref)`, if one exists.
pub fn transform_batch(
    records: &[StagingRecord],
    source: AtomSource,
    now: DateTime<Utc>,
    lookup: impl Fn(&str) -> Option<Atom>,
) -> TransformOutcome {
    let mut atoms = Vec::with_capacity(records.len());
    let mut warnings = Vec::new();
    let mut skipped = 0;

    for record in records.iter().filter(|r| !r.tombstoned) {
        let existing = lookup(&record.external_id);
        match transform_one(record, source, existing.as_ref(), now) {
            Ok(atom) => atoms.push(atom),
            Err(warning) => {
                tracing::warn!(external_id = %record.external_id, "{warning}");
                warnings.push(warning);
                skipped += 1;
            }
        }
    }

    TransformOutcome {
        atoms,
        warnings,
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(external_id: &str, front: Option<&str>, back: Option<&str>) -> StagingRecord {
        let mut props = serde_json::Map::new();
        if let Some(f) = front {
            props.insert("front".to_string(), json!(f));
        }
        if let Some(b) = back {
            props.insert("back".to_string(), json!(b));
        }
        StagingRecord {
            collection: "tasks".to_string(),
            external_id: external_id.to_string(),
            properties: serde_json::Value::Object(props),
            external_last_edited: Utc::now(),
            tombstoned: false,
        }
    }

    #[test]
    fn test_missing_back_is_skipped_with_warning() {
        let records = vec![record("page-1", Some("Q"), None)];
        let outcome = transform_batch(&records, AtomSource::Notion, Utc::now(), |_| None);
        assert!(outcome.atoms.is_empty());
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_valid_record_produces_atom() {
        let records = vec![record("page-1", Some("What is TCP?"), Some("Transmission Control Protocol"))];
        let outcome = transform_batch(&records, AtomSource::Notion, Utc::now(), |_| None);
        assert_eq!(outcome.atoms.len(), 1);
        assert_eq!(outcome.atoms[0].front, "What is TCP?");
        assert_eq!(outcome.atoms[0].version, 1);
    }

    #[test]
    fn test_idempotent_retransform_preserves_identity_and_fsrs() {
        let mut prior = {
            let records = vec![record("page-1", Some("Q"), Some("A"))];
            transform_batch(&records, AtomSource::Notion, Utc::now(), |_| None)
                .atoms
                .remove(0)
        };
        prior.fsrs_state.review_count = 7;

        let records = vec![record("page-1", Some("Q updated"), Some("A"))];
        let lookup_id = prior.atom_id;
        let outcome = transform_batch(&records, AtomSource::Notion, Utc::now(), move |ext_id| {
            if ext_id == "page-1" {
                Some(prior.clone())
            } else {
                None
            }
        });

        let atom = &outcome.atoms[0];
        assert_eq!(atom.atom_id, lookup_id);
        assert_eq!(atom.front, "Q updated");
        assert_eq!(atom.fsrs_state.review_count, 7);
        assert_eq!(atom.version, 2);
    }

    #[test]
    fn test_tombstoned_records_are_excluded() {
        let mut r = record("page-1", Some("Q"), Some("A"));
        r.tombstoned = true;
        let outcome = transform_batch(&[r], AtomSource::Notion, Utc::now(), |_| None);
        assert!(outcome.atoms.is_empty());
        assert_eq!(outcome.skipped, 0);
    }
}
