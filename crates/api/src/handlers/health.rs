//! `GET /health` (§6.4): rolls up storage/Notion/Anki/LLM reachability the
//! way the teacher's `/v1/ready` rolled up `check_connection`, generalized
//! to the four collaborators §1 names out of scope.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use cortex_domain::{HealthComponents, HealthResponse};
use cortex_storage::check_connection;

use crate::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let storage = match check_connection(&state.pool).await {
        Ok(()) => "connected",
        Err(_) => "disconnected",
    };
    let notion = if state.config.notion_api_key.is_empty() {
        "unconfigured"
    } else {
        "configured"
    };
    let ai = if state.config.llm_api_key.is_empty() {
        "unconfigured"
    } else {
        "configured"
    };

    Json(HealthResponse {
        status: if storage == "connected" { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build_sha: option_env!("BUILD_SHA").unwrap_or("dev").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: HealthComponents {
            storage,
            notion,
            anki: "configured",
            ai,
        },
    })
}
