//! Scheduler (§4.I): the spaced-repetition memory-state update. A
//! deterministic simplified FSRS: fixed deltas for difficulty, a
//! review-count-driven stability multiplier on success, a flat penalty on
//! failure. No persistence, no clock reads — `last_review`/`next_review`
//! are passed in and returned, never fetched.

use chrono::{DateTime, Duration, Utc};

use cortex_domain::atom::FsrsState;
use cortex_domain::response::ReviewGrade;

const DIFFICULTY_GOOD_DELTA: f32 = -0.05;
const DIFFICULTY_FAIL_DELTA: f32 = 0.1;
const STABILITY_FAIL_MULTIPLIER: f32 = 0.5;
const RETRIEVABILITY_SUCCESS: f32 = 0.95;
const RETRIEVABILITY_FAIL_FACTOR: f32 = 0.70;

const MIN_STABILITY_DAYS: f32 = 1.0;
const MAX_STABILITY_DAYS: f32 = 365.0;

/// Growth factor applied to stability on a successful review. Diminishing
/// returns as `review_count` climbs, so stability doesn't compound forever
/// on an easy atom.
fn growth(review_count: u32) -> f32 {
    0.6 / (1.0 + review_count as f32 * 0.2)
}

fn is_success(grade: ReviewGrade) -> bool {
    !matches!(grade, ReviewGrade::Again)
}

/// Infers a review grade from a raw response per §4.I: failure beats hint
/// beats fast-correct beats the default `Good`.
pub fn infer_grade(is_correct: bool, hint_used: bool, response_time_ms: u32) -> ReviewGrade {
    if !is_correct {
        ReviewGrade::Again
    } else if hint_used {
        ReviewGrade::Hard
    } else if response_time_ms < 2000 {
        ReviewGrade::Easy
    } else {
        ReviewGrade::Good
    }
}

/// Applies one review to `state`, returning the updated memory state. `now`
/// is the moment of review and becomes the new `last_review`.
pub fn update(state: &FsrsState, grade: ReviewGrade, now: DateTime<Utc>) -> FsrsState {
    let success = is_success(grade);

    let difficulty = if success {
        match grade {
            ReviewGrade::Good | ReviewGrade::Easy => state.difficulty + DIFFICULTY_GOOD_DELTA,
            ReviewGrade::Hard => state.difficulty + DIFFICULTY_FAIL_DELTA,
            ReviewGrade::Again => unreachable!("filtered by is_success"),
        }
    } else {
        state.difficulty + DIFFICULTY_FAIL_DELTA
    }
    .clamp(0.0, 1.0);

    let stability_days = if success {
        let multiplier = 1.0 + growth(state.review_count);
        (state.stability_days.max(MIN_STABILITY_DAYS) * multiplier).min(MAX_STABILITY_DAYS)
    } else {
        (state.stability_days * STABILITY_FAIL_MULTIPLIER).max(MIN_STABILITY_DAYS)
    };

    let retrievability = if success {
        RETRIEVABILITY_SUCCESS
    } else {
        (state.retrievability * RETRIEVABILITY_FAIL_FACTOR).min(state.retrievability)
    };

    let review_count = state.review_count + 1;
    let lapses = if success { state.lapses } else { state.lapses + 1 };

    let next_review = now + Duration::seconds((stability_days * 86_400.0) as i64);

    FsrsState {
        stability_days,
        difficulty,
        retrievability,
        review_count,
        lapses,
        last_review: Some(now),
        next_review: Some(next_review),
    }
}

/// A freshly-created atom schedules for immediate review (§4.I "NEW items
/// schedule immediately").
pub fn schedule_new(now: DateTime<Utc>) -> FsrsState {
    FsrsState {
        next_review: Some(now),
        ..FsrsState::new()
    }
}

/// Whether `state` is due for review at `now`.
pub fn is_due(state: &FsrsState, now: DateTime<Utc>) -> bool {
    state.next_review.map(|nr| nr <= now).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_infer_grade_precedence() {
        assert_eq!(infer_grade(false, true, 500), ReviewGrade::Again);
        assert_eq!(infer_grade(true, true, 500), ReviewGrade::Hard);
        assert_eq!(infer_grade(true, false, 1500), ReviewGrade::Easy);
        assert_eq!(infer_grade(true, false, 3000), ReviewGrade::Good);
    }

    #[test]
    fn test_success_increases_stability_and_decreases_difficulty() {
        let state = FsrsState {
            stability_days: 2.0,
            difficulty: 0.5,
            retrievability: 0.8,
            review_count: 1,
            lapses: 0,
            last_review: None,
            next_review: None,
        };
        let updated = update(&state, ReviewGrade::Good, at(2026, 1, 1));
        assert!(updated.stability_days > state.stability_days);
        assert!(updated.difficulty < state.difficulty);
        assert_eq!(updated.retrievability, RETRIEVABILITY_SUCCESS);
        assert_eq!(updated.review_count, 2);
        assert_eq!(updated.lapses, 0);
    }

    #[test]
    fn test_failure_halves_stability_and_increases_lapses() {
        let state = FsrsState {
            stability_days: 10.0,
            difficulty: 0.3,
            retrievability: 0.9,
            review_count: 3,
            lapses: 0,
            last_review: None,
            next_review: None,
        };
        let updated = update(&state, ReviewGrade::Again, at(2026, 1, 1));
        assert_eq!(updated.stability_days, 5.0);
        assert!(updated.difficulty > state.difficulty);
        assert_eq!(updated.lapses, 1);
        assert!(updated.retrievability <= state.retrievability);
    }

    #[test]
    fn test_difficulty_clamped_to_unit_interval() {
        let mut state = FsrsState::new();
        state.difficulty = 0.02;
        let updated = update(&state, ReviewGrade::Good, at(2026, 1, 1));
        assert!(updated.difficulty >= 0.0);

        let mut state = FsrsState::new();
        state.difficulty = 0.95;
        let updated = update(&state, ReviewGrade::Again, at(2026, 1, 1));
        assert!(updated.difficulty <= 1.0);
    }

    #[test]
    fn test_new_atom_schedules_immediately() {
        let now = at(2026, 1, 1);
        let state = schedule_new(now);
        assert!(is_due(&state, now));
    }

    #[test]
    fn test_next_review_follows_stability_days() {
        let state = FsrsState {
            stability_days: 4.0,
            ..FsrsState::new()
        };
        let now = at(2026, 1, 1);
        let updated = update(&state, ReviewGrade::Good, now);
        let next = updated.next_review.unwrap();
        assert!(next > now);
        assert!((next - now).num_days() >= 1);
    }
}
