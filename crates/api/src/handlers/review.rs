//! `/api/review/*` handlers (§4.G, §6.4): list the review queue and
//! approve/reject individual items through the Rewriter.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use cortex_domain::atom::Atom;
use cortex_domain::errors::DomainError;
use cortex_domain::review::{RejectRequest, ReviewQueueItem, ReviewStatus};
use uuid::Uuid;

use crate::AppState;

fn parse_status(raw: &str) -> Result<ReviewStatus, DomainError> {
    match raw {
        "pending" => Ok(ReviewStatus::Pending),
        "approved" => Ok(ReviewStatus::Approved),
        "rejected" => Ok(ReviewStatus::Rejected),
        "edited" => Ok(ReviewStatus::Edited),
        "error" => Ok(ReviewStatus::Error),
        other => Err(DomainError::Validation(format!(
            "unknown review status {other}"
        ))),
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct ReviewListQuery {
    pub status: Option<String>,
}

pub async fn review_list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReviewListQuery>,
) -> Result<Json<Vec<ReviewQueueItem>>, DomainError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let items = state
        .review_queue
        .list(status)
        .await
        .map_err(DomainError::Internal)?;
    Ok(Json(items))
}

pub async fn review_approve(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<Vec<Atom>>, DomainError> {
    let atoms = state.rewriter.approve(item_id, Utc::now()).await?;
    Ok(Json(atoms))
}

pub async fn review_reject(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> Result<Json<()>, DomainError> {
    state
        .rewriter
        .reject(item_id, req.reason, Utc::now())
        .await?;
    Ok(Json(()))
}
