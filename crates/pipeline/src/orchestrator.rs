//! Orchestrator (§4.L): runs the cleaning pipeline's stages in order —
//! Transform, Analyze, Detect, optional EnqueueRewrite, Summary — with
//! per-stage progress and `--resume` support via the stage log.

use std::sync::Arc;

use cortex_core::duplicate::{detect, DuplicateCandidate};
use cortex_core::quality::{analyze, AnalyzerMode, QualityThresholds};
use cortex_domain::atom::{Atom, AtomSource, QualityGrade};
use cortex_domain::duplicate::DuplicateGroup;
use cortex_domain::errors::DomainError;
use cortex_ports::{
    CanonicalStore, Clock, DuplicateGroupStore, ReviewQueueStore, StageLogStore, StagingStore,
};
use uuid::Uuid;

use crate::rewriter::Rewriter;
use crate::transform::transform_batch;

pub const STAGE_TRANSFORM: &str = "transform";
pub const STAGE_ANALYZE: &str = "analyze";
pub const STAGE_DETECT: &str = "detect";
pub const STAGE_ENQUEUE_REWRITE: &str = "enqueue_rewrite";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Completed,
    CompletedWithWarnings,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub enable_rewrite: bool,
    pub min_grade: QualityGrade,
    pub dry_run: bool,
    pub resume: bool,
    pub run_id: Uuid,
    pub collection: String,
    pub source: AtomSource,
}

#[derive(Debug, Default)]
pub struct StageSummary {
    pub atoms_transformed: u32,
    pub atoms_skipped: u32,
    pub atoms_graded: u32,
    pub duplicate_groups_found: u32,
    pub review_items_enqueued: u32,
    pub warnings: Vec<String>,
}

pub struct Orchestrator {
    pub staging: Arc<dyn StagingStore>,
    pub canonical: Arc<dyn CanonicalStore>,
    pub review_queue: Arc<dyn ReviewQueueStore>,
    pub duplicate_groups: Arc<dyn DuplicateGroupStore>,
    pub stage_log: Arc<dyn StageLogStore>,
    pub clock: Arc<dyn Clock>,
    pub quality_thresholds: QualityThresholds,
    pub analyzer_mode: AnalyzerMode,
    pub fuzzy_threshold: f64,
    /// Backs the EnqueueRewrite stage (§4.G): calls out to the LLM for a
    /// rewrite/split suggestion rather than enqueueing a bare review item.
    pub rewriter: Arc<Rewriter>,
}

impl Orchestrator {
    pub async fn run(&self, options: RunOptions) -> Result<(PipelineStatus, StageSummary), DomainError> {
        let completed = if options.resume {
            self.stage_log
                .completed_stages(options.run_id)
                .await
                .map_err(DomainError::Internal)?
        } else {
            Vec::new()
        };

        let mut summary = StageSummary::default();
        let now = self.clock.now();

        if !completed.contains(&STAGE_TRANSFORM.to_string()) {
            let staged = self
                .staging
                .list_collection(&options.collection)
                .await
                .map_err(DomainError::Internal)?;

            let canonical = self.canonical.as_ref();
            let mut transformed = Vec::new();
            for record in &staged {
                let existing = canonical
                    .get_by_source_ref(options.source, &record.external_id)
                    .await
                    .map_err(DomainError::Internal)?;
                let outcome = transform_batch(
                    std::slice::from_ref(record),
                    options.source,
                    now,
                    |_| existing.clone(),
                );
                summary.warnings.extend(outcome.warnings);
                summary.atoms_skipped += outcome.skipped;
                transformed.extend(outcome.atoms);
            }

            if !options.dry_run {
                for atom in &transformed {
                    self.canonical
                        .upsert(atom.clone())
                        .await
                        .map_err(DomainError::Internal)?;
                }
            }
            summary.atoms_transformed = transformed.len() as u32;
            self.mark_stage_done(&options, STAGE_TRANSFORM).await?;
        }

        if !completed.contains(&STAGE_ANALYZE.to_string()) {
            let atoms = self.canonical.list_all().await.map_err(DomainError::Internal)?;
            for mut atom in atoms {
                let output = match analyze(
                    &atom.front,
                    &atom.back,
                    atom.atom_type,
                    &self.quality_thresholds,
                    self.analyzer_mode,
                ) {
                    Ok(output) => output,
                    Err(err) => {
                        tracing::warn!(atom_id = %atom.atom_id, error = %err, "skipping malformed atom in analyze stage");
                        summary.warnings.push(format!("{}: {err}", atom.atom_id));
                        continue;
                    }
                };

                atom.quality_grade = output.grade;
                atom.quality_score = output.score;
                atom.quality_issues = output.issues;
                atom.flags = output.flags;
                summary.atoms_graded += 1;

                if !options.dry_run {
                    let expected_version = atom.version;
                    self.canonical
                        .update_checked(atom, expected_version)
                        .await?;
                }
            }
            self.mark_stage_done(&options, STAGE_ANALYZE).await?;
        }

        if !completed.contains(&STAGE_DETECT.to_string()) {
            let atoms = self.canonical.list_all().await.map_err(DomainError::Internal)?;
            let existing_groups: Vec<DuplicateGroup> = Vec::new();
            let candidates: Vec<DuplicateCandidate> = atoms
                .iter()
                .map(|a| DuplicateCandidate {
                    atom_id: a.atom_id,
                    front: a.front.clone(),
                    back: a.back.clone(),
                    section_id: a.section_id.clone(),
                    concept_ids: a.concept_ids.iter().cloned().collect(),
                })
                .collect();
            let outcome = detect(&candidates, &existing_groups, self.fuzzy_threshold, None);
            summary.duplicate_groups_found = outcome.groups.len() as u32;
            summary.warnings.extend(outcome.warnings);

            if !options.dry_run && !outcome.groups.is_empty() {
                self.duplicate_groups
                    .upsert_groups(outcome.groups)
                    .await
                    .map_err(DomainError::Internal)?;
            }
            self.mark_stage_done(&options, STAGE_DETECT).await?;
        }

        if options.enable_rewrite && !completed.contains(&STAGE_ENQUEUE_REWRITE.to_string()) {
            let atoms = self.canonical.list_all().await.map_err(DomainError::Internal)?;
            let candidates: Vec<Atom> = atoms
                .into_iter()
                .filter(|a| a.quality_grade <= options.min_grade)
                .collect();

            if options.dry_run {
                summary.review_items_enqueued += candidates
                    .iter()
                    .filter(|a| a.is_schedulable() && a.quality_grade.needs_rewrite())
                    .count() as u32;
            } else {
                let rewrite_outcome = self.rewriter.enqueue_low_grade_atoms(&candidates, now).await?;
                summary.review_items_enqueued += rewrite_outcome.enqueued + rewrite_outcome.errored;
            }
            self.mark_stage_done(&options, STAGE_ENQUEUE_REWRITE).await?;
        }

        let status = if summary.warnings.is_empty() {
            PipelineStatus::Completed
        } else {
            PipelineStatus::CompletedWithWarnings
        };
        Ok((status, summary))
    }

    async fn mark_stage_done(&self, options: &RunOptions, stage: &str) -> Result<(), DomainError> {
        if options.dry_run {
            return Ok(());
        }
        self.stage_log
            .mark_completed(options.run_id, stage)
            .await
            .map_err(DomainError::Internal)
    }
}
