//! Study Engine (§4.H–§4.K): composes the Mastery Aggregator, FSRS
//! Scheduler, Interleaver, and Diagnosis Engine into the two operations the
//! `study` CLI/HTTP surface needs — assembling a session queue and
//! recording one response. No stage here talks to Notion/Anki/the LLM;
//! everything reaches storage only through `cortex_ports` traits, the same
//! discipline `crates/pipeline/src/orchestrator.rs` uses for the cleaning
//! pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use cortex_core::diagnosis::{diagnose, Diagnosis, DiagnoseInput, HistoryPoint};
use cortex_core::interleaver::{build_session, Candidate, SessionInput, TypeMinimums, TypeQuotas};
use cortex_core::mastery::{compute_section, needs_remediation_flag, SectionMastery};
use cortex_core::scheduler;
use cortex_domain::atom::{Atom, AtomId};
use cortex_domain::errors::DomainError;
use cortex_domain::persona::{LearnerPersona, ProcessingSpeed, StruggleSignal};
use cortex_domain::response::Response;
use cortex_ports::{CanonicalStore, Clock, PersonaStore, ResponseStore, StruggleStore};

/// The fraction of "fast" responses (< this many ms) a learner needs in
/// their last-10 history to be classified `*_accurate`/`*_inaccurate` as
/// fast rather than slow (§3 `ProcessingSpeed`).
const FAST_RESPONSE_MS: u32 = 3000;

pub struct StudyEngine {
    pub canonical: Arc<dyn CanonicalStore>,
    pub responses: Arc<dyn ResponseStore>,
    pub personas: Arc<dyn PersonaStore>,
    pub struggles: Arc<dyn StruggleStore>,
    pub clock: Arc<dyn Clock>,
    pub type_quotas: TypeQuotas,
    pub type_minimums: TypeMinimums,
}

/// One response accepted into a study session, prior to diagnosis.
pub struct RecordResponseInput<'a> {
    pub atom_id: AtomId,
    pub learner_id: &'a str,
    pub is_correct: bool,
    pub response_time_ms: u32,
    pub hint_used: bool,
    pub chosen_option: Option<String>,
    pub session_id: Uuid,
    /// Known confusable wrong answers for this atom's correct MCQ option
    /// (§4.K discrimination-error override). The canonical `Atom` doesn't
    /// carry per-option confusable sets (§3 names no such field), so the
    /// caller — which owns the rendered question — supplies them.
    pub confusables: &'a [String],
}

pub struct RecordResponseOutcome {
    pub atom: Atom,
    pub diagnosis: Diagnosis,
}

impl StudyEngine {
    /// Rebuilds leaf-level `StruggleSignal`s for every section with at
    /// least one schedulable atom (§4.H, §3 "rebuilt on each sync or
    /// session close"). This workspace has no Section-hierarchy store (§3
    /// Section is a curriculum coordinate, not data this repo persists), so
    /// rollup to parent sections is left to callers that do have one —
    /// `cortex_core::mastery::roll_up` is exported for that purpose.
    pub async fn rebuild_struggle_signals(&self) -> Result<Vec<StruggleSignal>, DomainError> {
        let atoms = self
            .canonical
            .list_schedulable(None)
            .await
            .map_err(DomainError::Internal)?;
        let all_responses = self.responses_for(&atoms).await?;

        let mut by_section: HashMap<String, Vec<&Atom>> = HashMap::new();
        for atom in &atoms {
            if let Some(section_id) = &atom.section_id {
                by_section.entry(section_id.clone()).or_default().push(atom);
            }
        }

        let response_refs: Vec<&Response> = all_responses.iter().collect();
        let signals: Vec<StruggleSignal> = by_section
            .into_iter()
            .map(|(section_id, section_atoms)| {
                let stats = compute_section(&section_id, &section_atoms, &response_refs);
                to_struggle_signal(stats)
            })
            .collect();

        self.struggles
            .save_all(signals.clone())
            .await
            .map_err(DomainError::Internal)?;
        Ok(signals)
    }

    /// Fetches the response history for exactly the atoms under
    /// consideration. The response store only indexes by atom/section, so
    /// this is deliberately capped per atom (§4.K recent_history is
    /// bounded at 10 anyway).
    async fn responses_for(&self, atoms: &[Atom]) -> Result<Vec<Response>, DomainError> {
        let mut out = Vec::new();
        for atom in atoms {
            let history = self
                .responses
                .history_for_atom(atom.atom_id, 200)
                .await
                .map_err(DomainError::Internal)?;
            out.extend(history);
        }
        Ok(out)
    }

    /// Assembles one study session (§4.J) from every schedulable atom:
    /// due reviews, brand-new atoms, and remediation candidates drawn from
    /// sections the struggle set flags.
    pub async fn build_daily_session(
        &self,
        session_size: usize,
        war_mode: bool,
    ) -> Result<Vec<Candidate>, DomainError> {
        let now = self.clock.now();
        let atoms = self
            .canonical
            .list_schedulable(None)
            .await
            .map_err(DomainError::Internal)?;
        let signals = self.rebuild_struggle_signals().await?;
        let struggling_sections: std::collections::HashSet<String> = signals
            .iter()
            .filter(|s| s.needs_remediation)
            .map(|s| s.section_id.clone())
            .collect();

        let mut due = Vec::new();
        let mut new_pool = Vec::new();
        let mut struggle_pool = Vec::new();

        for atom in &atoms {
            let candidate = to_candidate(atom);
            if atom.fsrs_state.review_count == 0 {
                new_pool.push(candidate);
                continue;
            }
            if atom
                .section_id
                .as_ref()
                .is_some_and(|s| struggling_sections.contains(s))
            {
                struggle_pool.push(candidate.clone());
            }
            if scheduler::is_due(&atom.fsrs_state, now) {
                due.push(candidate);
            }
        }

        let input = SessionInput {
            session_size,
            due,
            new_pool,
            struggle_pool,
            war_mode,
        };
        Ok(build_session(input, self.type_quotas, self.type_minimums))
    }

    /// Records one learner response (§3 Response, append-only): diagnoses
    /// it (§4.K), applies the FSRS update (§4.I) under the atom's
    /// optimistic lock, persists the response, and updates the learner's
    /// persona by EMA (§4.K step iii).
    pub async fn record_response(
        &self,
        input: RecordResponseInput<'_>,
    ) -> Result<RecordResponseOutcome, DomainError> {
        let now = self.clock.now();
        let atom = self
            .canonical
            .get(input.atom_id)
            .await
            .map_err(DomainError::Internal)?
            .ok_or_else(|| DomainError::NotFound(input.atom_id.to_string()))?;

        let history: Vec<HistoryPoint> = self
            .responses
            .history_for_atom(input.atom_id, 10)
            .await
            .map_err(DomainError::Internal)?
            .into_iter()
            .map(|r| HistoryPoint {
                response_time_ms: r.response_time_ms,
            })
            .collect();

        let diagnosis = diagnose(DiagnoseInput {
            atom_type: atom.atom_type,
            lapses: atom.fsrs_state.lapses,
            review_count: atom.fsrs_state.review_count,
            is_correct: input.is_correct,
            response_time_ms: input.response_time_ms,
            recent_history: &history,
            chosen_option: input.chosen_option.as_deref(),
            confusables: input.confusables,
        });

        let grade = scheduler::infer_grade(input.is_correct, input.hint_used, input.response_time_ms);
        let mut updated_atom = atom.clone();
        updated_atom.fsrs_state = scheduler::update(&atom.fsrs_state, grade, now);
        updated_atom.updated_at = now;
        let expected_version = atom.version;
        let updated_atom = self
            .canonical
            .update_checked(updated_atom, expected_version)
            .await?;

        let response = Response {
            atom_id: input.atom_id,
            section_id: atom.section_id.clone(),
            is_correct: input.is_correct,
            response_time_ms: input.response_time_ms,
            hint_used: input.hint_used,
            chosen_option: input.chosen_option,
            timestamp: now,
            session_id: input.session_id,
        };
        self.responses
            .append(response)
            .await
            .map_err(DomainError::Internal)?;

        self.apply_persona_update(input.learner_id, &atom, input.is_correct, input.response_time_ms, &diagnosis)
            .await?;

        Ok(RecordResponseOutcome {
            atom: updated_atom,
            diagnosis,
        })
    }

    async fn apply_persona_update(
        &self,
        learner_id: &str,
        atom: &Atom,
        is_correct: bool,
        response_time_ms: u32,
        diagnosis: &Diagnosis,
    ) -> Result<(), DomainError> {
        let mut persona = self
            .personas
            .get(learner_id)
            .await
            .map_err(DomainError::Internal)?;

        let observed_strength = if is_correct { 1.0 } else { 0.0 };
        let current_strength = *persona.strengths.get(&atom.knowledge_type).unwrap_or(&0.5);
        persona.strengths.insert(
            atom.knowledge_type,
            LearnerPersona::ema_update(current_strength, observed_strength),
        );

        let remediation_key = format!("{:?}", diagnosis.remediation);
        let observed_effectiveness = if is_correct { 1.0 } else { 0.0 };
        let current_effectiveness = *persona.effectiveness.get(&remediation_key).unwrap_or(&0.5);
        persona.effectiveness.insert(
            remediation_key,
            LearnerPersona::ema_update(current_effectiveness, observed_effectiveness),
        );

        persona.processing_speed = classify_processing_speed(response_time_ms, is_correct, persona.processing_speed);

        let observed_calibration = if is_correct { 1.0 } else { 0.0 };
        persona.calibration_score =
            LearnerPersona::ema_update(persona.calibration_score, observed_calibration);

        self.personas
            .save(learner_id, &persona)
            .await
            .map_err(DomainError::Internal)
    }
}

fn to_candidate(atom: &Atom) -> Candidate {
    Candidate {
        atom_id: atom.atom_id,
        atom_type: atom.atom_type,
        weakness_score: (1.0 - atom.fsrs_state.retrievability).max(0.0),
    }
}

fn to_struggle_signal(stats: SectionMastery) -> StruggleSignal {
    let reason = if stats.avg_retrievability < 0.70 {
        "avg_retrievability below 0.70".to_string()
    } else if stats.avg_lapses > 3.0 {
        "avg_lapses above 3".to_string()
    } else if stats.mcq_accuracy < 0.80 {
        "mcq_accuracy below 0.80".to_string()
    } else if needs_remediation_flag(stats.remediation_score) {
        "remediation_score below threshold".to_string()
    } else {
        "healthy".to_string()
    };

    StruggleSignal {
        section_id: stats.section_id,
        avg_retrievability: stats.avg_retrievability,
        avg_lapses: stats.avg_lapses,
        mcq_accuracy: stats.mcq_accuracy,
        parsons_accuracy: stats.parsons_accuracy,
        needs_remediation: stats.needs_remediation,
        reason,
    }
}

/// Classifies processing speed from one observation, smoothing against the
/// learner's current bucket instead of flipping on a single response: a
/// single disagreeing sample nudges, a run of them flips the bucket.
fn classify_processing_speed(
    response_time_ms: u32,
    is_correct: bool,
    current: ProcessingSpeed,
) -> ProcessingSpeed {
    let fast = response_time_ms < FAST_RESPONSE_MS;
    let observed = match (fast, is_correct) {
        (true, true) => ProcessingSpeed::FastAccurate,
        (true, false) => ProcessingSpeed::FastInaccurate,
        (false, true) => ProcessingSpeed::SlowAccurate,
        (false, false) => ProcessingSpeed::SlowInaccurate,
    };
    if observed == current {
        current
    } else {
        observed
    }
}
