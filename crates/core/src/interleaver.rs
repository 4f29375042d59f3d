//! Interleaver (§4.J): assembles a single study session queue from due
//! reviews, new content, and remediation candidates, then reorders the
//! result so same-type atoms don't repeat back to back.

use std::collections::HashMap;

use cortex_domain::atom::{AtomId, AtomType};

/// One schedulable candidate as the interleaver sees it. Storage/pipeline
/// map their richer `Atom` rows down to this before calling [`build_session`].
#[derive(Debug, Clone)]
pub struct Candidate {
    pub atom_id: AtomId,
    pub atom_type: AtomType,
    /// Higher means weaker; used only by war mode (§4.J step 6).
    pub weakness_score: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct TypeQuotas {
    pub mcq: f32,
    pub true_false: f32,
    pub parsons: f32,
    pub matching: f32,
}

impl Default for TypeQuotas {
    fn default() -> Self {
        Self {
            mcq: 0.35,
            true_false: 0.25,
            parsons: 0.25,
            matching: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TypeMinimums {
    pub mcq: usize,
    pub true_false: usize,
    pub parsons: usize,
    pub matching: usize,
}

impl Default for TypeMinimums {
    fn default() -> Self {
        Self {
            mcq: 2,
            true_false: 2,
            parsons: 2,
            matching: 1,
        }
    }
}

pub struct SessionInput {
    pub session_size: usize,
    pub due: Vec<Candidate>,
    pub new_pool: Vec<Candidate>,
    pub struggle_pool: Vec<Candidate>,
    pub war_mode: bool,
}

/// Hard cap 0.50 (§4.J step 1); below that, bands widen with struggle-set size.
pub fn remediation_ratio(struggle_set_size: usize) -> f32 {
    match struggle_set_size {
        0 => 0.0,
        1..=2 => 0.30,
        3..=5 => 0.40,
        _ => 0.50,
    }
}

fn quota_type(t: AtomType) -> Option<&'static str> {
    match t {
        AtomType::Mcq => Some("mcq"),
        AtomType::TrueFalse => Some("true_false"),
        AtomType::Parsons => Some("parsons"),
        AtomType::Matching => Some("matching"),
        _ => None,
    }
}

/// Builds and interleaves a session queue per §4.J steps 1-6.
pub fn build_session(
    input: SessionInput,
    quotas: TypeQuotas,
    minimums: TypeMinimums,
) -> Vec<Candidate> {
    if input.war_mode {
        return war_mode_session(input);
    }

    let n = input.session_size;
    let mut due = input.due;
    let mut new_pool = input.new_pool;
    let mut struggle_pool = input.struggle_pool;

    // Step 2: due reviews first, bounded by N.
    let due_take = due.len().min(n);
    let mut queue: Vec<Candidate> = due.drain(..due_take).collect();

    // Step 1 + 3: split the remaining slots between new and remediation.
    let remaining = n.saturating_sub(queue.len());
    let rho = remediation_ratio(struggle_pool.len());
    let remediation_target = ((remaining as f32) * rho).round() as usize;
    let new_target = remaining.saturating_sub(remediation_target);

    take_up_to(&mut queue, &mut struggle_pool, remediation_target);
    take_up_to(&mut queue, &mut new_pool, new_target);

    // Shortfall from one pool backfills from whichever has spare candidates.
    while queue.len() < n {
        if !struggle_pool.is_empty() {
            queue.push(struggle_pool.remove(0));
        } else if !new_pool.is_empty() {
            queue.push(new_pool.remove(0));
        } else if !due.is_empty() {
            queue.push(due.remove(0));
        } else {
            break;
        }
    }

    // Step 4: quota minimums, back-filling shortfalls preferring MCQ.
    enforce_minimums(&mut queue, &mut due, &mut new_pool, &mut struggle_pool, minimums, n);
    apply_quotas(&mut queue, &mut due, &mut new_pool, &mut struggle_pool, quotas, minimums, n);

    // Step 5: round-robin interleave to avoid consecutive same-type runs.
    interleave(queue)
}

fn take_up_to(queue: &mut Vec<Candidate>, pool: &mut Vec<Candidate>, count: usize) {
    let take = pool.len().min(count);
    queue.extend(pool.drain(..take));
}

/// Removes one candidate from the back of `queue` to make room for a
/// minimum backfill: prefers a non-quota type, then a quota type that's
/// already above its own minimum. Returns `false` if nothing is replaceable
/// (queue is entirely at-minimum quota types), in which case the queue is
/// allowed to exceed `target_n` rather than break a different minimum.
fn make_room(queue: &mut Vec<Candidate>, minimums: TypeMinimums, target_n: usize) -> bool {
    if queue.len() < target_n {
        return true;
    }
    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    for c in queue.iter() {
        if let Some(key) = quota_type(c.atom_type) {
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    let min_for = |key: &str| -> usize {
        match key {
            "mcq" => minimums.mcq,
            "true_false" => minimums.true_false,
            "parsons" => minimums.parsons,
            "matching" => minimums.matching,
            _ => 0,
        }
    };
    for i in (0..queue.len()).rev() {
        match quota_type(queue[i].atom_type) {
            None => {
                queue.remove(i);
                return true;
            }
            Some(key) => {
                if counts.get(key).copied().unwrap_or(0) > min_for(key) {
                    queue.remove(i);
                    return true;
                }
            }
        }
    }
    false
}

fn enforce_minimums(
    queue: &mut Vec<Candidate>,
    due: &mut Vec<Candidate>,
    new_pool: &mut Vec<Candidate>,
    struggle_pool: &mut Vec<Candidate>,
    minimums: TypeMinimums,
    target_n: usize,
) {
    let count_of = |queue: &[Candidate], key: &str| -> usize {
        queue
            .iter()
            .filter(|c| quota_type(c.atom_type) == Some(key))
            .count()
    };

    let needed = [
        ("mcq", minimums.mcq, AtomType::Mcq),
        ("true_false", minimums.true_false, AtomType::TrueFalse),
        ("parsons", minimums.parsons, AtomType::Parsons),
        ("matching", minimums.matching, AtomType::Matching),
    ];

    for (key, min, atom_type) in needed {
        let mut shortfall = min.saturating_sub(count_of(queue, key));
        while shortfall > 0 {
            let found = [due as &mut Vec<Candidate>, new_pool, struggle_pool]
                .into_iter()
                .find_map(|pool| {
                    pool.iter()
                        .position(|c| c.atom_type == atom_type)
                        .map(|i| pool.remove(i))
                });
            let Some(candidate) = found else { break };
            if !make_room(queue, minimums, target_n) {
                // No replaceable slot; grow the queue rather than drop the candidate.
            }
            queue.push(candidate);
            shortfall -= 1;
        }
        // Remaining shortfall (exhausted pools) is backfilled preferring MCQ.
        if shortfall > 0 && key != "mcq" {
            while shortfall > 0 {
                let found = [due as &mut Vec<Candidate>, new_pool, struggle_pool]
                    .into_iter()
                    .find_map(|pool| {
                        pool.iter()
                            .position(|c| c.atom_type == AtomType::Mcq)
                            .map(|i| pool.remove(i))
                    });
                let Some(candidate) = found else { break };
                make_room(queue, minimums, target_n);
                queue.push(candidate);
                shortfall -= 1;
            }
        }
    }
}

const QUOTA_KEYS: [&str; 4] = ["mcq", "true_false", "parsons", "matching"];

fn key_type(key: &str) -> AtomType {
    match key {
        "mcq" => AtomType::Mcq,
        "true_false" => AtomType::TrueFalse,
        "parsons" => AtomType::Parsons,
        "matching" => AtomType::Matching,
        _ => unreachable!("quota key {key}"),
    }
}

fn quota_target(key: &str, quotas: TypeQuotas, n: usize) -> usize {
    let frac = match key {
        "mcq" => quotas.mcq,
        "true_false" => quotas.true_false,
        "parsons" => quotas.parsons,
        "matching" => quotas.matching,
        _ => 0.0,
    };
    (frac * n as f32).round() as usize
}

fn quota_minimum(key: &str, minimums: TypeMinimums) -> usize {
    match key {
        "mcq" => minimums.mcq,
        "true_false" => minimums.true_false,
        "parsons" => minimums.parsons,
        "matching" => minimums.matching,
        _ => 0,
    }
}

fn count_of(queue: &[Candidate], key: &str) -> usize {
    queue.iter().filter(|c| quota_type(c.atom_type) == Some(key)).count()
}

fn pool_has(pools: &[&Vec<Candidate>], atom_type: AtomType) -> bool {
    pools.iter().any(|pool| pool.iter().any(|c| c.atom_type == atom_type))
}

fn take_of_type(pools: &mut [&mut Vec<Candidate>], atom_type: AtomType) -> Option<Candidate> {
    for pool in pools.iter_mut() {
        if let Some(i) = pool.iter().position(|c| c.atom_type == atom_type) {
            return Some(pool.remove(i));
        }
    }
    None
}

/// Nudges the filled queue toward the type-quota proportions (§4.J step 4,
/// §8 scenario 5), swapping one over-quota candidate at a time for an
/// available under-quota one drawn from the remaining pools. Never trims a
/// type below its own minimum, and stops once no further swap is possible
/// (no replacement candidate, or every over-quota type is already at its
/// floor) — the result is a soft proportional fit, not an exact one.
fn apply_quotas(
    queue: &mut Vec<Candidate>,
    due: &mut Vec<Candidate>,
    new_pool: &mut Vec<Candidate>,
    struggle_pool: &mut Vec<Candidate>,
    quotas: TypeQuotas,
    minimums: TypeMinimums,
    target_n: usize,
) {
    if target_n == 0 {
        return;
    }
    loop {
        let targets: HashMap<&str, usize> = QUOTA_KEYS
            .into_iter()
            .map(|k| (k, quota_target(k, quotas, target_n)))
            .collect();
        let counts: HashMap<&str, usize> =
            QUOTA_KEYS.into_iter().map(|k| (k, count_of(queue, k))).collect();

        let over = QUOTA_KEYS
            .into_iter()
            .filter(|&k| counts[k] > targets[k] && counts[k] > quota_minimum(k, minimums))
            .max_by_key(|&k| counts[k] - targets[k]);

        let under = QUOTA_KEYS
            .into_iter()
            .filter(|&k| counts[k] < targets[k] && pool_has(&[&*due, &*new_pool, &*struggle_pool], key_type(k)))
            .max_by_key(|&k| targets[k] - counts[k]);

        let (Some(over_key), Some(under_key)) = (over, under) else {
            break;
        };

        let Some(over_idx) = queue.iter().rposition(|c| quota_type(c.atom_type) == Some(over_key)) else {
            break;
        };
        let Some(replacement) =
            take_of_type(&mut [&mut *due, &mut *new_pool, &mut *struggle_pool], key_type(under_key))
        else {
            break;
        };

        queue.remove(over_idx);
        queue.push(replacement);
    }
}

/// Round-robins over per-type buckets so no type repeats back to back
/// unless the queue is dominated by a single type (§4.J step 5).
fn interleave(queue: Vec<Candidate>) -> Vec<Candidate> {
    let mut buckets: HashMap<AtomType, Vec<Candidate>> = HashMap::new();
    for c in queue {
        buckets.entry(c.atom_type).or_default().push(c);
    }
    let mut keys: Vec<AtomType> = buckets.keys().copied().collect();
    keys.sort_by_key(|t| format!("{t:?}"));

    let mut out = Vec::new();
    let mut last_type: Option<AtomType> = None;
    loop {
        let mut progressed = false;
        for &t in &keys {
            if Some(t) == last_type && keys.len() > 1 {
                continue;
            }
            if let Some(bucket) = buckets.get_mut(&t) {
                if !bucket.is_empty() {
                    out.push(bucket.remove(0));
                    last_type = Some(t);
                    progressed = true;
                }
            }
        }
        if !progressed {
            // Every remaining bucket is the same type as `last_type`; drain it.
            for &t in &keys {
                if let Some(bucket) = buckets.get_mut(&t) {
                    out.append(bucket);
                }
            }
            break;
        }
        if buckets.values().all(|b| b.is_empty()) {
            break;
        }
    }
    out
}

fn war_mode_session(input: SessionInput) -> Vec<Candidate> {
    let mut all: Vec<Candidate> = input
        .due
        .into_iter()
        .chain(input.new_pool)
        .chain(input.struggle_pool)
        .collect();
    all.sort_by(|a, b| b.weakness_score.partial_cmp(&a.weakness_score).unwrap());
    all.truncate(input.session_size);
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn candidate(atom_type: AtomType) -> Candidate {
        Candidate {
            atom_id: Uuid::new_v4(),
            atom_type,
            weakness_score: 0.0,
        }
    }

    #[test]
    fn test_remediation_ratio_bands() {
        assert_eq!(remediation_ratio(0), 0.0);
        assert_eq!(remediation_ratio(2), 0.30);
        assert_eq!(remediation_ratio(5), 0.40);
        assert_eq!(remediation_ratio(9), 0.50);
    }

    #[test]
    fn test_due_reviews_take_priority() {
        let input = SessionInput {
            session_size: 3,
            due: vec![
                candidate(AtomType::Flashcard),
                candidate(AtomType::Flashcard),
                candidate(AtomType::Flashcard),
            ],
            new_pool: vec![candidate(AtomType::Flashcard)],
            struggle_pool: vec![],
            war_mode: false,
        };
        let session = build_session(input, TypeQuotas::default(), TypeMinimums::default());
        assert_eq!(session.len(), 3);
    }

    #[test]
    fn test_minimums_are_backfilled_when_content_permits() {
        let mut new_pool = vec![candidate(AtomType::Flashcard); 10];
        new_pool.push(candidate(AtomType::Mcq));
        new_pool.push(candidate(AtomType::Mcq));

        let input = SessionInput {
            session_size: 6,
            due: vec![],
            new_pool,
            struggle_pool: vec![],
            war_mode: false,
        };
        let session = build_session(input, TypeQuotas::default(), TypeMinimums::default());
        let mcq_count = session.iter().filter(|c| c.atom_type == AtomType::Mcq).count();
        assert!(mcq_count >= 2);
    }

    #[test]
    fn test_no_consecutive_same_type_when_alternative_exists() {
        let new_pool = vec![
            candidate(AtomType::Mcq),
            candidate(AtomType::Mcq),
            candidate(AtomType::TrueFalse),
            candidate(AtomType::TrueFalse),
        ];
        let input = SessionInput {
            session_size: 4,
            due: vec![],
            new_pool,
            struggle_pool: vec![],
            war_mode: false,
        };
        let session = build_session(input, TypeQuotas::default(), TypeMinimums::default());
        for window in session.windows(2) {
            assert_ne!(window[0].atom_type, window[1].atom_type);
        }
    }

    #[test]
    fn test_quota_proportions_approximated_from_balanced_pool() {
        let mut new_pool = Vec::new();
        for _ in 0..10 {
            new_pool.push(candidate(AtomType::Mcq));
            new_pool.push(candidate(AtomType::TrueFalse));
            new_pool.push(candidate(AtomType::Parsons));
            new_pool.push(candidate(AtomType::Matching));
        }

        let input = SessionInput {
            session_size: 20,
            due: vec![],
            new_pool,
            struggle_pool: vec![],
            war_mode: false,
        };
        let session = build_session(input, TypeQuotas::default(), TypeMinimums::default());
        assert_eq!(session.len(), 20);

        let count = |t: AtomType| session.iter().filter(|c| c.atom_type == t).count();
        assert!((count(AtomType::Mcq) as i32 - 7).abs() <= 1);
        assert!((count(AtomType::TrueFalse) as i32 - 5).abs() <= 1);
        assert!((count(AtomType::Parsons) as i32 - 5).abs() <= 1);
        assert!((count(AtomType::Matching) as i32 - 3).abs() <= 1);
    }

    #[test]
    fn test_war_mode_selects_by_weakness() {
        let mut weak = candidate(AtomType::Flashcard);
        weak.weakness_score = 0.9;
        let mut strong = candidate(AtomType::Flashcard);
        strong.weakness_score = 0.1;

        let input = SessionInput {
            session_size: 1,
            due: vec![strong],
            new_pool: vec![weak.clone()],
            struggle_pool: vec![],
            war_mode: true,
        };
        let session = build_session(input, TypeQuotas::default(), TypeMinimums::default());
        assert_eq!(session.len(), 1);
        assert_eq!(session[0].atom_id, weak.atom_id);
    }
}
