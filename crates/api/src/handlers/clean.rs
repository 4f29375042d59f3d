//! `POST /api/clean/run` (§4.L, §6.4): runs one collection through the
//! cleaning pipeline Orchestrator and reports the stage summary. The
//! literal request body names `{enable_rewrite, min_grade, dry_run}`;
//! `collection`/`source` default to the first configured Notion collection
//! since a single HTTP call runs one collection at a time, same as
//! `cortex clean run --database <name>` does on the CLI.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use cortex_domain::atom::{AtomSource, QualityGrade};
use cortex_domain::errors::DomainError;
use cortex_pipeline::{PipelineStatus, RunOptions, StageSummary};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::auth::AdminApiKey;
use crate::AppState;

fn default_min_grade() -> QualityGrade {
    QualityGrade::D
}

#[derive(Debug, Deserialize)]
pub struct CleanRunRequest {
    #[serde(default)]
    pub enable_rewrite: bool,
    #[serde(default = "default_min_grade")]
    pub min_grade: QualityGrade,
    #[serde(default)]
    pub dry_run: bool,
    pub collection: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CleanRunResponse {
    pub run_id: Uuid,
    pub status: &'static str,
    pub atoms_transformed: u32,
    pub atoms_skipped: u32,
    pub atoms_graded: u32,
    pub duplicate_groups_found: u32,
    pub review_items_enqueued: u32,
    pub warnings: Vec<String>,
}

fn status_tag(status: PipelineStatus) -> &'static str {
    match status {
        PipelineStatus::Completed => "completed",
        PipelineStatus::CompletedWithWarnings => "completed_with_warnings",
        PipelineStatus::Failed => "failed",
    }
}

fn to_response(run_id: Uuid, status: PipelineStatus, summary: StageSummary) -> CleanRunResponse {
    CleanRunResponse {
        run_id,
        status: status_tag(status),
        atoms_transformed: summary.atoms_transformed,
        atoms_skipped: summary.atoms_skipped,
        atoms_graded: summary.atoms_graded,
        duplicate_groups_found: summary.duplicate_groups_found,
        review_items_enqueued: summary.review_items_enqueued,
        warnings: summary.warnings,
    }
}

pub async fn clean_run(
    State(state): State<Arc<AppState>>,
    _admin: AdminApiKey,
    Json(req): Json<CleanRunRequest>,
) -> Result<Json<CleanRunResponse>, DomainError> {
    let collection = req.collection.unwrap_or_else(|| {
        state
            .config
            .notion_collections
            .keys()
            .next()
            .cloned()
            .unwrap_or_else(|| "default".to_string())
    });
    let run_id = Uuid::new_v4();

    let (status, summary) = state
        .orchestrator
        .run(RunOptions {
            enable_rewrite: req.enable_rewrite,
            min_grade: req.min_grade,
            dry_run: req.dry_run,
            resume: false,
            run_id,
            collection,
            source: AtomSource::Notion,
        })
        .await?;

    Ok(Json(to_response(run_id, status, summary)))
}
