#![cfg(feature = "postgres-tests")]

use std::sync::Arc;
use std::time::Instant;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use cortex_api::{build_router, AppState};
use cortex_config::AppConfig;
use cortex_core::quality::{AnalyzerMode, QualityThresholds};
use cortex_pipeline::{Orchestrator, Rewriter};
use cortex_ports::{Clock, LlmClient, NotionAdapter, PageBatch, RewritePrompt, SystemClock};
use cortex_storage::{
    CanonicalRepository, CheckpointRepository, DuplicateGroupRepository, ReviewQueueRepository,
    StageLogRepository, StagingRepository, SyncRunRepository,
};
use cortex_sync::SyncEngine;
use dashmap::DashMap;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

/// A `NotionAdapter` that never reaches the network; the sync-trigger tests
/// in this file only exercise routing, auth, and response shape.
struct DeadNotionAdapter;

#[async_trait::async_trait]
impl NotionAdapter for DeadNotionAdapter {
    async fn list_pages(
        &self,
        _collection: &str,
        _since_watermark: Option<chrono::DateTime<chrono::Utc>>,
        _cursor: Option<String>,
    ) -> anyhow::Result<PageBatch> {
        anyhow::bail!("no network access in tests")
    }
}

struct DeadLlmClient;

#[async_trait::async_trait]
impl LlmClient for DeadLlmClient {
    async fn improve(
        &self,
        _prompt: &RewritePrompt,
    ) -> anyhow::Result<cortex_ports::ImproveSuggestion> {
        anyhow::bail!("no network access in tests")
    }

    async fn split(
        &self,
        _prompt: &RewritePrompt,
    ) -> anyhow::Result<Vec<cortex_ports::SplitSuggestion>> {
        anyhow::bail!("no network access in tests")
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".to_string(),
        notion_api_key: "test-key".to_string(),
        notion_collections: Default::default(),
        ankiconnect_url: "http://127.0.0.1:8765".to_string(),
        llm_api_key: String::new(),
        llm_model: "claude-sonnet".to_string(),
        notion_rate_limit: cortex_config::RateLimit {
            requests_per_second: 3.0,
        },
        quality: cortex_config::QualityThresholds::default(),
        type_quotas: cortex_config::TypeQuotas::default(),
        type_minimums: cortex_config::TypeMinimums::default(),
        duplicate_fuzzy_threshold: 0.85,
        fsrs_target_retention: 0.9,
        sync_interval: std::time::Duration::from_secs(3600),
        write_protection: true,
        dry_run: false,
        log_level: "info".to_string(),
        log_path: None,
        bind_address: "127.0.0.1:0".to_string(),
        admin_api_key: "test-admin-key".to_string(),
    }
}

fn test_state(pool: PgPool) -> Arc<AppState> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let config = test_config();

    let staging = Arc::new(StagingRepository::new(pool.clone()));
    let canonical = Arc::new(CanonicalRepository::new(pool.clone()));
    let checkpoints = Arc::new(CheckpointRepository::new(pool.clone()));
    let run_log = Arc::new(SyncRunRepository::new(pool.clone()));
    let review_queue = Arc::new(ReviewQueueRepository::new(pool.clone()));
    let duplicate_groups = Arc::new(DuplicateGroupRepository::new(pool.clone()));
    let stage_log = Arc::new(StageLogRepository::new(pool.clone()));

    let rate_limiter = Arc::new(cortex_sync::TokenBucket::new(100.0, clock.as_ref()));

    let sync_engine = Arc::new(SyncEngine {
        notion: Arc::new(DeadNotionAdapter),
        staging: staging.clone(),
        checkpoints,
        run_log: run_log.clone(),
        clock: clock.clone(),
        rate_limiter,
    });

    let quality = QualityThresholds::default();
    let rewriter = Arc::new(Rewriter {
        canonical: canonical.clone(),
        review_queue: review_queue.clone(),
        llm: Arc::new(DeadLlmClient),
        quality_thresholds: quality,
        analyzer_mode: AnalyzerMode::Relaxed,
    });

    let orchestrator = Arc::new(Orchestrator {
        staging,
        canonical,
        review_queue: review_queue.clone(),
        duplicate_groups,
        stage_log,
        clock: clock.clone(),
        quality_thresholds: quality,
        analyzer_mode: AnalyzerMode::Relaxed,
        fuzzy_threshold: config.duplicate_fuzzy_threshold,
        rewriter: rewriter.clone(),
    });

    Arc::new(AppState {
        pool,
        sync_engine,
        run_log,
        orchestrator,
        rewriter,
        review_queue,
        cancel_flags: Arc::new(DashMap::new()),
        config,
        start_time: Instant::now(),
    })
}

#[sqlx::test(migrations = "../storage/migrations")]
async fn health_reports_storage_connected(pool: PgPool) -> Result<(), sqlx::Error> {
    let app = build_router(test_state(pool));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["components"]["storage"], "connected");
    Ok(())
}

#[sqlx::test(migrations = "../storage/migrations")]
async fn sync_notion_requires_admin_key(pool: PgPool) -> Result<(), sqlx::Error> {
    let app = build_router(test_state(pool));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/sync/notion")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"incremental": true}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[sqlx::test(migrations = "../storage/migrations")]
async fn sync_notion_dry_run_completes_immediately(pool: PgPool) -> Result<(), sqlx::Error> {
    let app = build_router(test_state(pool));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/sync/notion")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-admin-key", "test-admin-key")
                .body(Body::from(r#"{"incremental": true, "dry_run": true}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["sync_id"].is_string());
    Ok(())
}

#[sqlx::test(migrations = "../storage/migrations")]
async fn sync_status_history_starts_empty(pool: PgPool) -> Result<(), sqlx::Error> {
    let app = build_router(test_state(pool));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/sync/history")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 0);
    Ok(())
}

#[sqlx::test(migrations = "../storage/migrations")]
async fn review_list_empty_queue(pool: PgPool) -> Result<(), sqlx::Error> {
    let app = build_router(test_state(pool));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/review")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 0);
    Ok(())
}

