//! Duplicate Detector (§4.F): exact, fuzzy, and optional semantic detection
//! of near-identical atoms. Produces `DuplicateGroup`s without mutating any
//! atom; callers decide what to do with an open group.

use std::collections::{HashMap, HashSet};

use cortex_domain::atom::AtomId;
use cortex_domain::duplicate::{DuplicateGroup, DuplicateMethod, DuplicateStatus};
use uuid::Uuid;

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.85;

/// The slice of an atom the detector needs; storage/pipeline map their own
/// `Atom` rows into this.
#[derive(Debug, Clone)]
pub struct DuplicateCandidate {
    pub atom_id: AtomId,
    pub front: String,
    pub back: String,
    pub section_id: Option<String>,
    pub concept_ids: Vec<String>,
}

/// Optional semantic-similarity collaborator (vector embeddings). When
/// unavailable, `detect` falls back to fuzzy and reports the fallback.
pub trait SemanticSimilarity {
    fn similarity(&self, a: &DuplicateCandidate, b: &DuplicateCandidate) -> Option<f64>;
}

pub struct DetectionOutcome {
    pub groups: Vec<DuplicateGroup>,
    pub warnings: Vec<String>,
}

/// Lower-cases, trims, and collapses whitespace/punctuation so that
/// cosmetic differences don't defeat exact matching.
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim_end().to_string()
}

fn tokens(text: &str) -> HashSet<String> {
    normalize(text)
        .split_whitespace()
        .map(String::from)
        .collect()
}

/// Jaccard similarity over the token sets of `normalize(front) +
/// normalize(back)`.
fn token_similarity(a: &DuplicateCandidate, b: &DuplicateCandidate) -> f64 {
    let ta = tokens(&format!("{} {}", a.front, a.back));
    let tb = tokens(&format!("{} {}", b.front, b.back));
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Groups candidates to keep fuzzy comparison near-linear: same `section_id`
/// if present, else first `concept_id`, else the first normalized token of
/// `front`.
fn blocking_key(c: &DuplicateCandidate) -> String {
    if let Some(section) = &c.section_id {
        return format!("section:{section}");
    }
    if let Some(concept) = c.concept_ids.first() {
        return format!("concept:{concept}");
    }
    normalize(&c.front)
        .split_whitespace()
        .next()
        .map(|w| format!("word:{w}"))
        .unwrap_or_else(|| "word:".to_string())
}

struct UnionFind {
    parent: HashMap<AtomId, AtomId>,
}

impl UnionFind {
    fn new() -> Self {
        Self {
            parent: HashMap::new(),
        }
    }

    fn find(&mut self, x: AtomId) -> AtomId {
        let p = *self.parent.entry(x).or_insert(x);
        if p == x {
            x
        } else {
            let root = self.find(p);
            self.parent.insert(x, root);
            root
        }
    }

    fn union(&mut self, a: AtomId, b: AtomId) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // Deterministic tie-break: the lower id becomes the root.
            if ra < rb {
                self.parent.insert(rb, ra);
            } else {
                self.parent.insert(ra, rb);
            }
        }
    }
}

/// Atom id pairs already covered by a resolved group, so re-detection
/// skips them (§4.F).
fn resolved_pairs(existing: &[DuplicateGroup]) -> HashSet<(AtomId, AtomId)> {
    existing
        .iter()
        .filter(|g| g.status == DuplicateStatus::Resolved)
        .flat_map(|g| g.pairs())
        .collect()
}

/// Exact duplicates: same `(normalize(front), normalize(back))` hash.
pub fn detect_exact(
    candidates: &[DuplicateCandidate],
    existing: &[DuplicateGroup],
) -> Vec<DuplicateGroup> {
    let resolved = resolved_pairs(existing);
    let mut buckets: HashMap<(String, String), Vec<AtomId>> = HashMap::new();
    for c in candidates {
        buckets
            .entry((normalize(&c.front), normalize(&c.back)))
            .or_default()
            .push(c.atom_id);
    }

    let mut groups = Vec::new();
    for mut ids in buckets.into_values() {
        if ids.len() < 2 {
            continue;
        }
        ids.sort();
        ids.dedup();
        if ids.len() < 2 {
            continue;
        }
        if all_pairs_resolved(&ids, &resolved) {
            continue;
        }
        groups.push(DuplicateGroup {
            id: Uuid::new_v4(),
            atom_ids: ids,
            method: DuplicateMethod::Exact,
            similarity: 1.0,
            status: DuplicateStatus::Open,
            canonical_atom_id: None,
        });
    }
    groups.sort_by_key(|g| g.atom_ids.first().copied());
    groups
}

fn all_pairs_resolved(ids: &[AtomId], resolved: &HashSet<(AtomId, AtomId)>) -> bool {
    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            let pair = if ids[i] < ids[j] {
                (ids[i], ids[j])
            } else {
                (ids[j], ids[i])
            };
            if !resolved.contains(&pair) {
                return false;
            }
        }
    }
    true
}

/// Fuzzy duplicates: pairwise token similarity within each blocking bucket,
/// connected-component grouping above `threshold`. Ties between equally
/// similar candidates break on lower `atom_id` via `UnionFind`'s root rule.
pub fn detect_fuzzy(
    candidates: &[DuplicateCandidate],
    existing: &[DuplicateGroup],
    threshold: f64,
) -> Vec<DuplicateGroup> {
    let resolved = resolved_pairs(existing);
    let mut blocks: HashMap<String, Vec<&DuplicateCandidate>> = HashMap::new();
    for c in candidates {
        blocks.entry(blocking_key(c)).or_default().push(c);
    }

    let mut uf = UnionFind::new();
    let mut best_similarity: HashMap<AtomId, f64> = HashMap::new();

    for bucket in blocks.values() {
        for i in 0..bucket.len() {
            for j in (i + 1)..bucket.len() {
                let a = bucket[i];
                let b = bucket[j];
                let pair = if a.atom_id < b.atom_id {
                    (a.atom_id, b.atom_id)
                } else {
                    (b.atom_id, a.atom_id)
                };
                if resolved.contains(&pair) {
                    continue;
                }
                let sim = token_similarity(a, b);
                if sim >= threshold {
                    uf.union(a.atom_id, b.atom_id);
                    best_similarity
                        .entry(pair.0)
                        .and_modify(|s| *s = s.max(sim))
                        .or_insert(sim);
                    best_similarity
                        .entry(pair.1)
                        .and_modify(|s| *s = s.max(sim))
                        .or_insert(sim);
                }
            }
        }
    }

    let mut components: HashMap<AtomId, Vec<AtomId>> = HashMap::new();
    for c in candidates {
        if uf.parent.contains_key(&c.atom_id) {
            let root = uf.find(c.atom_id);
            components.entry(root).or_default().push(c.atom_id);
        }
    }

    let mut groups = Vec::new();
    for (_, mut ids) in components {
        if ids.len() < 2 {
            continue;
        }
        ids.sort();
        ids.dedup();
        let similarity = ids
            .iter()
            .filter_map(|id| best_similarity.get(id).copied())
            .fold(0.0_f64, f64::max);
        groups.push(DuplicateGroup {
            id: Uuid::new_v4(),
            atom_ids: ids,
            method: DuplicateMethod::Fuzzy,
            similarity,
            status: DuplicateStatus::Open,
            canonical_atom_id: None,
        });
    }
    groups.sort_by_key(|g| g.atom_ids.first().copied());
    groups
}

/// Runs exact then fuzzy detection, and semantic when a collaborator is
/// supplied. Falls back to fuzzy results with a warning when semantic
/// similarity isn't available, per §4.F.
pub fn detect(
    candidates: &[DuplicateCandidate],
    existing: &[DuplicateGroup],
    fuzzy_threshold: f64,
    semantic: Option<&dyn SemanticSimilarity>,
) -> DetectionOutcome {
    let mut groups = detect_exact(candidates, existing);
    let exact_ids: HashSet<AtomId> = groups.iter().flat_map(|g| g.atom_ids.iter().copied()).collect();
    let remaining: Vec<DuplicateCandidate> = candidates
        .iter()
        .filter(|c| !exact_ids.contains(&c.atom_id))
        .cloned()
        .collect();

    let mut warnings = Vec::new();
    match semantic {
        Some(provider) => {
            let resolved = resolved_pairs(existing);
            let mut uf = UnionFind::new();
            for i in 0..remaining.len() {
                for j in (i + 1)..remaining.len() {
                    let a = &remaining[i];
                    let b = &remaining[j];
                    let pair = if a.atom_id < b.atom_id {
                        (a.atom_id, b.atom_id)
                    } else {
                        (b.atom_id, a.atom_id)
                    };
                    if resolved.contains(&pair) {
                        continue;
                    }
                    if let Some(sim) = provider.similarity(a, b) {
                        if sim >= fuzzy_threshold {
                            uf.union(a.atom_id, b.atom_id);
                        }
                    }
                }
            }
            let mut components: HashMap<AtomId, Vec<AtomId>> = HashMap::new();
            for c in &remaining {
                if uf.parent.contains_key(&c.atom_id) {
                    let root = uf.find(c.atom_id);
                    components.entry(root).or_default().push(c.atom_id);
                }
            }
            for (_, mut ids) in components {
                if ids.len() < 2 {
                    continue;
                }
                ids.sort();
                groups.push(DuplicateGroup {
                    id: Uuid::new_v4(),
                    atom_ids: ids,
                    method: DuplicateMethod::Semantic,
                    similarity: fuzzy_threshold,
                    status: DuplicateStatus::Open,
                    canonical_atom_id: None,
                });
            }
        }
        None => {
            warnings.push(
                "semantic similarity unavailable, falling back to fuzzy detection".to_string(),
            );
            groups.extend(detect_fuzzy(&remaining, existing, fuzzy_threshold));
        }
    }

    groups.sort_by_key(|g| g.atom_ids.first().copied());
    DetectionOutcome { groups, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: u128, front: &str, back: &str) -> DuplicateCandidate {
        DuplicateCandidate {
            atom_id: Uuid::from_u128(id),
            front: front.to_string(),
            back: back.to_string(),
            section_id: Some("sec-1".to_string()),
            concept_ids: vec![],
        }
    }

    #[test]
    fn test_exact_duplicate_ignores_case_and_punctuation() {
        let candidates = vec![
            candidate(1, "What is TCP?", "Transmission Control Protocol"),
            candidate(2, "what is tcp", "transmission control protocol."),
        ];
        let groups = detect_exact(&candidates, &[]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].atom_ids.len(), 2);
        assert_eq!(groups[0].method, DuplicateMethod::Exact);
    }

    #[test]
    fn test_fuzzy_groups_near_identical_text() {
        let candidates = vec![
            candidate(1, "What is the capital of France?", "Paris is the capital of France"),
            candidate(2, "What is the capital city of France?", "Paris is the capital of France"),
            candidate(3, "What is the capital of Germany?", "Berlin is the capital of Germany"),
        ];
        let groups = detect_fuzzy(&candidates, &[], DEFAULT_FUZZY_THRESHOLD);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].atom_ids.contains(&Uuid::from_u128(1)));
        assert!(groups[0].atom_ids.contains(&Uuid::from_u128(2)));
        assert!(!groups[0].atom_ids.contains(&Uuid::from_u128(3)));
    }

    #[test]
    fn test_resolved_groups_excluded_from_redetection() {
        let candidates = vec![
            candidate(1, "What is TCP?", "Transmission Control Protocol"),
            candidate(2, "what is tcp", "transmission control protocol."),
        ];
        let existing = vec![DuplicateGroup {
            id: Uuid::new_v4(),
            atom_ids: vec![Uuid::from_u128(1), Uuid::from_u128(2)],
            method: DuplicateMethod::Exact,
            similarity: 1.0,
            status: DuplicateStatus::Resolved,
            canonical_atom_id: Some(Uuid::from_u128(1)),
        }];
        let groups = detect_exact(&candidates, &existing);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_semantic_fallback_warns_and_uses_fuzzy() {
        let candidates = vec![
            candidate(1, "What is the capital of France?", "Paris is the capital of France"),
            candidate(2, "What is the capital city of France?", "Paris is the capital of France"),
        ];
        let outcome = detect(&candidates, &[], DEFAULT_FUZZY_THRESHOLD, None);
        assert_eq!(outcome.groups.len(), 1);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_group_pairs_are_symmetric() {
        let candidates = vec![
            candidate(2, "What is TCP?", "Transmission Control Protocol"),
            candidate(1, "what is tcp", "transmission control protocol."),
        ];
        let groups = detect_exact(&candidates, &[]);
        let pairs = groups[0].pairs();
        assert_eq!(pairs, vec![(Uuid::from_u128(1), Uuid::from_u128(2))]);
    }
}
