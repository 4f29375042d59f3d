//! Quality Analyzer (§4.E): a pure function over `(front, back, atom_type)`
//! that yields a grade, a 0-100 score, a multiset of issue kinds, and the
//! derived workflow flags. No I/O, no clock, no RNG — callers thread in
//! whatever context they need before or after calling `analyze`.

use cortex_domain::atom::{AtomFlags, AtomType, QualityGrade, QualityIssue};
use cortex_domain::errors::DomainError;

/// Word/char thresholds the analyzer checks against. Defaults follow §4.E's
/// evidence-based ranges; callers load these from configuration so an
/// operator can retune them without a rebuild.
#[derive(Debug, Clone, Copy)]
pub struct QualityThresholds {
    pub front_optimal_words: u32,
    pub front_max_words: u32,
    pub back_optimal_words: u32,
    pub back_warn_words: u32,
    pub back_max_words: u32,
    pub back_max_chars: u32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            front_optimal_words: 15,
            front_max_words: 25,
            back_optimal_words: 5,
            back_warn_words: 15,
            back_max_words: 15,
            back_max_chars: 120,
        }
    }
}

/// Strict mode hard-rejects atoms that breach a max threshold instead of
/// merely grading them down (§4.E "Modes").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalyzerMode {
    #[default]
    Relaxed,
    Strict,
}

const WEIGHT_ENUMERATION: u8 = 65;
const WEIGHT_MULTIPLE_FACTS: u8 = 25;
const WEIGHT_BACK_VERBOSE: u8 = 15;
const WEIGHT_FRONT_TOO_LONG: u8 = 10;
const WEIGHT_BACK_TOO_LONG: u8 = 15;

const CONJUNCTIONS: [&str; 5] = ["and", "but", "also", "additionally", "because"];

#[derive(Debug, Clone)]
pub struct AnalyzeOutput {
    pub grade: QualityGrade,
    pub score: u8,
    pub issues: Vec<QualityIssue>,
    pub flags: AtomFlags,
    /// Set in `Strict` mode when a max threshold is breached; callers should
    /// refuse to sync the atom rather than merely flag it for review.
    pub blocked: bool,
}

/// Runs the deterministic grading pass over a single front/back pair.
///
/// `atom_type` is accepted per the §4.E signature but does not currently
/// change thresholds — every atom type shares one set of word/char bands.
pub fn analyze(
    front: &str,
    back: &str,
    _atom_type: AtomType,
    thresholds: &QualityThresholds,
    mode: AnalyzerMode,
) -> Result<AnalyzeOutput, DomainError> {
    if front.trim().is_empty() || back.trim().is_empty() {
        return Err(DomainError::AnalyzerMalformedInput(
            "front and back must both be non-empty".to_string(),
        ));
    }

    let front_words = word_count(front);
    let back_words = word_count(back);
    let back_chars = back.chars().count() as u32;

    let mut issues = Vec::new();

    if is_enumeration(back) {
        issues.push(QualityIssue::EnumerationDetected);
    }
    if has_conjoined_sentences(back) {
        issues.push(QualityIssue::MultipleFacts);
    }
    let is_verbose = back_words > thresholds.back_warn_words;
    if is_verbose {
        issues.push(QualityIssue::BackVerbose);
    }
    if front_words > thresholds.front_max_words {
        issues.push(QualityIssue::FrontTooLong);
    }
    let back_too_long = back_words > thresholds.back_max_words || back_chars > thresholds.back_max_chars;
    if back_too_long {
        issues.push(QualityIssue::BackTooLong);
    }

    let mut score: i32 = 100;
    for issue in &issues {
        score -= match issue {
            QualityIssue::EnumerationDetected => WEIGHT_ENUMERATION as i32,
            QualityIssue::MultipleFacts => WEIGHT_MULTIPLE_FACTS as i32,
            QualityIssue::BackVerbose => WEIGHT_BACK_VERBOSE as i32,
            QualityIssue::FrontTooLong => WEIGHT_FRONT_TOO_LONG as i32,
            QualityIssue::BackTooLong => WEIGHT_BACK_TOO_LONG as i32,
        };
    }
    let score = score.clamp(0, 100) as u8;
    let grade = QualityGrade::from_score(score);

    let needs_split = issues.contains(&QualityIssue::EnumerationDetected)
        || issues.contains(&QualityIssue::MultipleFacts);
    let is_atomic = !needs_split;
    let needs_rewrite = grade.needs_rewrite();

    let flags = AtomFlags {
        is_atomic,
        is_verbose,
        needs_split,
        needs_rewrite,
        needs_review: needs_rewrite || needs_split,
    };

    let blocked = mode == AnalyzerMode::Strict
        && (front_words > thresholds.front_max_words || back_too_long);

    Ok(AnalyzeOutput {
        grade,
        score,
        issues,
        flags,
        blocked,
    })
}

fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// A numbered or bulleted list embedded in running text: `1.`, `2)`, `-`, `*`
/// or `•` markers appearing at least twice.
fn is_enumeration(text: &str) -> bool {
    let markers = text
        .split_whitespace()
        .filter(|tok| {
            let stripped = tok.trim_end_matches(['.', ')']);
            (!stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()))
                || matches!(*tok, "-" | "*" | "•")
        })
        .count();
    markers >= 2
}

/// Two or more sentences stitched together with a conjunction, rather than
/// one atomic fact.
fn has_conjoined_sentences(text: &str) -> bool {
    let sentence_count = text
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count();
    if sentence_count < 2 {
        return false;
    }
    let lower = text.to_lowercase();
    CONJUNCTIONS
        .iter()
        .any(|word| lower.split_whitespace().any(|tok| tok.trim_matches(',') == *word))
}
