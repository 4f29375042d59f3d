//! Learning-content pipeline HTTP API (§6.4).

pub mod handlers;
pub mod middleware;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use dashmap::DashMap;
use sqlx::PgPool;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use cortex_config::AppConfig;
use cortex_pipeline::{Orchestrator, Rewriter};
use cortex_ports::{ReviewQueueStore, SyncRunLog};
use cortex_sync::SyncEngine;

use handlers::clean::clean_run;
use handlers::health::health;
use handlers::review::{review_approve, review_list, review_reject};
use handlers::sync::{sync_cancel, sync_history, sync_notion, sync_status, sync_status_latest};
use middleware::auth::AdminApiKey;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub sync_engine: Arc<SyncEngine>,
    pub run_log: Arc<dyn SyncRunLog>,
    pub orchestrator: Arc<Orchestrator>,
    pub rewriter: Arc<Rewriter>,
    pub review_queue: Arc<dyn ReviewQueueStore>,
    /// One cancel flag per in-flight sync run (§4.B, §7 "Cancellation"),
    /// grounded on the teacher's `DashMap`-backed verification cache —
    /// shared mutable lookup reached from many request handlers at once.
    pub cancel_flags: Arc<DashMap<Uuid, Arc<AtomicBool>>>,
    pub config: AppConfig,
    pub start_time: Instant,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(2)
            .burst_size(10)
            .finish()
            .expect("governor config builds with static limits"),
    );

    Router::new()
        .route("/health", get(health))
        .route("/api/sync/notion", post(sync_notion))
        .route("/api/sync/status", get(sync_status_latest))
        .route("/api/sync/status/{id}", get(sync_status))
        .route("/api/sync/history", get(sync_history))
        .route("/api/sync/{id}/cancel", post(sync_cancel))
        .route("/api/clean/run", post(clean_run))
        .route("/api/review", get(review_list))
        .route("/api/review/{id}/approve", post(review_approve))
        .route("/api/review/{id}/reject", post(review_reject))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .with_state(state)
}
