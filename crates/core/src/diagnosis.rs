//! Cognitive Diagnosis Engine (§4.K): classifies a single response into a
//! success or failure mode and a remediation directive. First-match-wins
//! over a fixed rule table; no state, no I/O.

use cortex_domain::atom::AtomType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailMode {
    Executive,
    Encoding,
    Integration,
    Fatigue,
    Retrieval,
    Discrimination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessMode {
    Fluency,
    Recall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remediation {
    SlowDown,
    ReadSource,
    WorkedExample,
    Elaborate,
    Rest,
    Repeat,
    Accelerate,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnosis {
    pub fail_mode: Option<FailMode>,
    pub success_mode: Option<SuccessMode>,
    pub remediation: Remediation,
}

impl Diagnosis {
    /// §4.K step (iii): an intervention event is recorded for these modes
    /// when the learner opts into remediation.
    pub fn warrants_intervention(&self) -> bool {
        matches!(
            self.fail_mode,
            Some(FailMode::Encoding) | Some(FailMode::Integration) | Some(FailMode::Discrimination)
        )
    }
}

/// One prior response, only the fields the engine needs.
#[derive(Debug, Clone, Copy)]
pub struct HistoryPoint {
    pub response_time_ms: u32,
}

pub struct DiagnoseInput<'a> {
    pub atom_type: AtomType,
    pub lapses: u32,
    pub review_count: u32,
    pub is_correct: bool,
    pub response_time_ms: u32,
    /// Up to 10 most recent prior responses, newest first.
    pub recent_history: &'a [HistoryPoint],
    /// The option the learner picked, for MCQ discrimination detection.
    pub chosen_option: Option<&'a str>,
    /// Known confusable wrong answers for the correct option on this atom.
    pub confusables: &'a [String],
}

const IMPULSIVE_RT_MS: u32 = 1500;
const FLUENCY_RT_MS: u32 = 3000;
const FATIGUE_RT_MS: u32 = 10_000;
const REPEATED_LAPSES: u32 = 3;
const FRESH_REVIEW_COUNT: u32 = 1;
const FATIGUE_WINDOW: usize = 5;

fn is_fatigued(current_rt_ms: u32, recent_history: &[HistoryPoint]) -> bool {
    let mut window: Vec<u32> = std::iter::once(current_rt_ms)
        .chain(recent_history.iter().map(|h| h.response_time_ms))
        .collect();
    window.truncate(FATIGUE_WINDOW);
    window.len() == FATIGUE_WINDOW && window.iter().all(|rt| *rt > FATIGUE_RT_MS)
}

fn is_discrimination_error(input: &DiagnoseInput) -> bool {
    match input.chosen_option {
        Some(chosen) => input.confusables.iter().any(|c| c == chosen),
        None => false,
    }
}

/// Runs the §4.K rule table, first match wins.
pub fn diagnose(input: DiagnoseInput) -> Diagnosis {
    if !input.is_correct {
        if input.response_time_ms < IMPULSIVE_RT_MS {
            return Diagnosis {
                fail_mode: Some(FailMode::Executive),
                success_mode: None,
                remediation: Remediation::SlowDown,
            };
        }
        if input.lapses >= REPEATED_LAPSES {
            return Diagnosis {
                fail_mode: Some(FailMode::Encoding),
                success_mode: None,
                remediation: Remediation::ReadSource,
            };
        }
        if matches!(input.atom_type, AtomType::Parsons | AtomType::Numeric) {
            return Diagnosis {
                fail_mode: Some(FailMode::Integration),
                success_mode: None,
                remediation: Remediation::WorkedExample,
            };
        }
        if input.review_count <= FRESH_REVIEW_COUNT {
            return Diagnosis {
                fail_mode: Some(FailMode::Encoding),
                success_mode: None,
                remediation: Remediation::Elaborate,
            };
        }
        if is_fatigued(input.response_time_ms, input.recent_history) {
            return Diagnosis {
                fail_mode: Some(FailMode::Fatigue),
                success_mode: None,
                remediation: Remediation::Rest,
            };
        }
        if is_discrimination_error(&input) {
            return Diagnosis {
                fail_mode: Some(FailMode::Discrimination),
                success_mode: None,
                remediation: Remediation::Repeat,
            };
        }
        return Diagnosis {
            fail_mode: Some(FailMode::Retrieval),
            success_mode: None,
            remediation: Remediation::Repeat,
        };
    }

    if is_fatigued(input.response_time_ms, input.recent_history) {
        return Diagnosis {
            fail_mode: Some(FailMode::Fatigue),
            success_mode: None,
            remediation: Remediation::Rest,
        };
    }
    if input.response_time_ms < FLUENCY_RT_MS {
        return Diagnosis {
            fail_mode: None,
            success_mode: Some(SuccessMode::Fluency),
            remediation: Remediation::Accelerate,
        };
    }
    Diagnosis {
        fail_mode: None,
        success_mode: Some(SuccessMode::Recall),
        remediation: Remediation::Continue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn base_input() -> DiagnoseInput<'static> {
        DiagnoseInput {
            atom_type: AtomType::Mcq,
            lapses: 0,
            review_count: 5,
            is_correct: false,
            response_time_ms: 1200,
            recent_history: &[],
            chosen_option: None,
            confusables: &[],
        }
    }

    #[test]
    fn test_impulsive_diagnosis_matches_spec_scenario() {
        let input = DiagnoseInput {
            atom_type: AtomType::Mcq,
            lapses: 0,
            review_count: 5,
            is_correct: false,
            response_time_ms: 1200,
            recent_history: &[],
            chosen_option: None,
            confusables: &[],
        };
        let diagnosis = diagnose(input);
        assert_eq!(diagnosis.fail_mode, Some(FailMode::Executive));
        assert_eq!(diagnosis.remediation, Remediation::SlowDown);
    }

    #[rstest]
    #[case::repeated(3, 1600, 5, FailMode::Encoding, Remediation::ReadSource)]
    fn test_repeated_lapses(
        #[case] lapses: u32,
        #[case] rt: u32,
        #[case] review_count: u32,
        #[case] expected_mode: FailMode,
        #[case] expected_remediation: Remediation,
    ) {
        let mut input = base_input();
        input.lapses = lapses;
        input.response_time_ms = rt;
        input.review_count = review_count;
        let diagnosis = diagnose(input);
        assert_eq!(diagnosis.fail_mode, Some(expected_mode));
        assert_eq!(diagnosis.remediation, expected_remediation);
    }

    #[test]
    fn test_procedural_failure_on_parsons() {
        let mut input = base_input();
        input.atom_type = AtomType::Parsons;
        input.response_time_ms = 5000;
        let diagnosis = diagnose(input);
        assert_eq!(diagnosis.fail_mode, Some(FailMode::Integration));
        assert_eq!(diagnosis.remediation, Remediation::WorkedExample);
    }

    #[test]
    fn test_fresh_atom_failure() {
        let mut input = base_input();
        input.review_count = 1;
        input.response_time_ms = 4000;
        let diagnosis = diagnose(input);
        assert_eq!(diagnosis.fail_mode, Some(FailMode::Encoding));
        assert_eq!(diagnosis.remediation, Remediation::Elaborate);
    }

    #[test]
    fn test_fatigue_detected_on_five_slow_responses() {
        let history = [HistoryPoint { response_time_ms: 11_000 }; 4];
        let mut input = base_input();
        input.response_time_ms = 12_000;
        input.review_count = 8;
        input.recent_history = &history;
        let diagnosis = diagnose(input);
        assert_eq!(diagnosis.fail_mode, Some(FailMode::Fatigue));
        assert_eq!(diagnosis.remediation, Remediation::Rest);
    }

    #[test]
    fn test_discrimination_overrides_default_fail() {
        let mut input = base_input();
        input.response_time_ms = 4000;
        input.review_count = 8;
        input.chosen_option = Some("wrong-but-similar");
        input.confusables = &["wrong-but-similar".to_string()];
        let diagnosis = diagnose(input);
        assert_eq!(diagnosis.fail_mode, Some(FailMode::Discrimination));
    }

    #[test]
    fn test_default_fail_when_nothing_else_matches() {
        let mut input = base_input();
        input.response_time_ms = 4000;
        input.review_count = 8;
        let diagnosis = diagnose(input);
        assert_eq!(diagnosis.fail_mode, Some(FailMode::Retrieval));
        assert_eq!(diagnosis.remediation, Remediation::Repeat);
    }

    #[test]
    fn test_fluency_on_fast_correct_response() {
        let mut input = base_input();
        input.is_correct = true;
        input.response_time_ms = 1000;
        let diagnosis = diagnose(input);
        assert_eq!(diagnosis.success_mode, Some(SuccessMode::Fluency));
        assert_eq!(diagnosis.remediation, Remediation::Accelerate);
    }

    #[test]
    fn test_default_success_on_slow_correct_response() {
        let mut input = base_input();
        input.is_correct = true;
        input.response_time_ms = 4000;
        let diagnosis = diagnose(input);
        assert_eq!(diagnosis.success_mode, Some(SuccessMode::Recall));
        assert_eq!(diagnosis.remediation, Remediation::Continue);
    }

    #[test]
    fn test_encoding_and_integration_warrant_intervention() {
        let encoding = Diagnosis {
            fail_mode: Some(FailMode::Encoding),
            success_mode: None,
            remediation: Remediation::Elaborate,
        };
        assert!(encoding.warrants_intervention());

        let executive = Diagnosis {
            fail_mode: Some(FailMode::Executive),
            success_mode: None,
            remediation: Remediation::SlowDown,
        };
        assert!(!executive.warrants_intervention());
    }
}
