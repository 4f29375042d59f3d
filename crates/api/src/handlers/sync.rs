//! `/api/sync/*` handlers (§4.B, §6.4): kicks off a Notion sync
//! asynchronously, returning the run id immediately, and exposes status/
//! history/cancel over the run log the Sync Engine already writes to.
//!
//! `dry_run: true` short-circuits before the Sync Engine is ever invoked —
//! the engine commits each batch as it lands (§4.B, §7 "Constraint violation
//! ... roll back the whole batch"), so there is no partial-run state to
//! preview; a dry run reports the collections that would have been synced
//! without touching staging, checkpoints, or the run log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use cortex_domain::errors::DomainError;
use cortex_domain::sync::{SyncMode, SyncNotionRequest, SyncRun, SyncStartedResponse, SyncStatus};
use uuid::Uuid;

use crate::middleware::auth::AdminApiKey;
use crate::AppState;

fn parse_status(raw: &str) -> Option<SyncStatus> {
    match raw {
        "running" => Some(SyncStatus::Running),
        "completed" => Some(SyncStatus::Completed),
        "completed_with_warnings" => Some(SyncStatus::CompletedWithWarnings),
        "failed" => Some(SyncStatus::Failed),
        "cancelled" => Some(SyncStatus::Cancelled),
        _ => None,
    }
}

fn status_tag(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Running => "running",
        SyncStatus::Completed => "completed",
        SyncStatus::CompletedWithWarnings => "completed_with_warnings",
        SyncStatus::Failed => "failed",
        SyncStatus::Cancelled => "cancelled",
    }
}

pub async fn sync_notion(
    State(state): State<Arc<AppState>>,
    _admin: AdminApiKey,
    Json(req): Json<SyncNotionRequest>,
) -> Result<Json<SyncStartedResponse>, DomainError> {
    let collections = if req.databases.is_empty() {
        state.config.notion_collections.keys().cloned().collect()
    } else {
        req.databases.clone()
    };
    let mode = if req.incremental {
        SyncMode::Incremental
    } else {
        SyncMode::Full
    };
    let sync_id = Uuid::new_v4();

    if req.dry_run || state.config.dry_run {
        let mut run = SyncRun::start_with_id(sync_id, mode, collections, Utc::now());
        run.completed_at = Some(Utc::now());
        run.status = SyncStatus::Completed;
        tracing::info!(sync_id = %sync_id, "dry-run sync: no collections touched");
        return Ok(Json(SyncStartedResponse { sync_id }));
    }

    let cancel = Arc::new(AtomicBool::new(false));
    state.cancel_flags.insert(sync_id, Arc::clone(&cancel));

    let engine = Arc::clone(&state.sync_engine);
    let parallel = req.parallel;
    tokio::spawn(async move {
        let result = engine.sync(sync_id, mode, collections, parallel, cancel).await;
        if let Err(err) = result {
            tracing::error!(sync_id = %sync_id, error = %err, "sync run ended in error");
        }
    });

    Ok(Json(SyncStartedResponse { sync_id }))
}

pub async fn sync_status_latest(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Option<SyncRun>>, DomainError> {
    let runs = state
        .run_log
        .history(None, 1)
        .await
        .map_err(DomainError::Internal)?;
    Ok(Json(runs.into_iter().next()))
}

pub async fn sync_status(
    State(state): State<Arc<AppState>>,
    Path(sync_id): Path<Uuid>,
) -> Result<Json<SyncRun>, DomainError> {
    state
        .run_log
        .get(sync_id)
        .await
        .map_err(DomainError::Internal)?
        .map(Json)
        .ok_or_else(|| DomainError::NotFound(format!("sync run {sync_id}")))
}

#[derive(Debug, serde::Deserialize)]
pub struct HistoryQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

pub async fn sync_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<SyncRun>>, DomainError> {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(status_tag(parse_status(raw).ok_or_else(|| {
            DomainError::Validation(format!("unknown sync status {raw}"))
        })?)),
    };
    let limit = query.limit.unwrap_or(20).min(200);

    let runs = state
        .run_log
        .history(status, limit)
        .await
        .map_err(DomainError::Internal)?;
    Ok(Json(runs))
}

pub async fn sync_cancel(
    State(state): State<Arc<AppState>>,
    _admin: AdminApiKey,
    Path(sync_id): Path<Uuid>,
) -> Result<Json<HashMap<&'static str, String>>, DomainError> {
    match state.cancel_flags.get(&sync_id) {
        Some(flag) => {
            flag.store(true, Ordering::SeqCst);
            Ok(Json(HashMap::from([("status", "cancelling".to_string())])))
        }
        None => Err(DomainError::NotFound(format!("running sync {sync_id}"))),
    }
}
