//! Pure domain algorithms: the Quality Analyzer, Duplicate Detector, FSRS
//! scheduler wrapper, Mastery Aggregator, Interleaver, and Cognitive
//! Diagnosis Engine (§4.E-§4.K). Every module here takes its dependencies
//! (time, randomness, storage) as explicit arguments or `cortex_ports`
//! traits — nothing reaches out to the network or a database directly.

pub mod diagnosis;
pub mod duplicate;
pub mod interleaver;
pub mod mastery;
pub mod quality;
pub mod scheduler;

pub use diagnosis::{diagnose, Diagnosis, DiagnoseInput, FailMode, HistoryPoint, Remediation, SuccessMode};
pub use duplicate::{detect, detect_exact, detect_fuzzy, DetectionOutcome, DuplicateCandidate};
pub use interleaver::{build_session, remediation_ratio, Candidate, SessionInput, TypeMinimums, TypeQuotas};
pub use mastery::{compute_section, roll_up, SectionMastery};
pub use quality::{analyze, AnalyzeOutput, AnalyzerMode, QualityThresholds};
pub use scheduler::{infer_grade, is_due, schedule_new, update as update_schedule};
