//! Learning-content pipeline HTTP API server.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cortex_api::{build_router, AppState};
use cortex_config::AppConfig;
use cortex_core::quality::{AnalyzerMode, QualityThresholds};
use cortex_pipeline::Orchestrator;
use cortex_pipeline::Rewriter;
use cortex_ports::{Clock, SystemClock};
use cortex_storage::{
    CanonicalRepository, CheckpointRepository, DuplicateGroupRepository, ReviewQueueRepository,
    StageLogRepository, StagingRepository, SyncRunRepository,
};
use cortex_sync::{AnthropicLlmClient, AnkiConnectClient, NotionClient, SyncEngine, TokenBucket};

/// The config crate's quality thresholds carry a `mode` and `usize` widths for
/// the config parser's convenience; the pipeline's own `QualityThresholds`
/// (consumed by the Quality Analyzer, §4.E) narrows to `u32` and keeps mode
/// as a sibling field (`AnalyzerMode`) rather than embedding it.
fn quality_thresholds(cfg: &cortex_config::QualityThresholds) -> QualityThresholds {
    QualityThresholds {
        front_optimal_words: cfg.front_optimal_words as u32,
        front_max_words: cfg.front_max_words as u32,
        back_optimal_words: cfg.back_optimal_words as u32,
        back_warn_words: cfg.back_warn_words as u32,
        back_max_words: cfg.back_max_words as u32,
        back_max_chars: cfg.back_max_chars as u32,
    }
}

fn analyzer_mode(cfg: &cortex_config::QualityThresholds) -> AnalyzerMode {
    match cfg.mode {
        cortex_config::QualityMode::Relaxed => AnalyzerMode::Relaxed,
        cortex_config::QualityMode::Strict => AnalyzerMode::Strict,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting cortex API server...");

    let config = AppConfig::from_env()?;
    tracing::info!(bind_address = %config.bind_address, "loaded configuration");

    let pool = cortex_storage::create_pool(&config.database_url).await?;
    cortex_storage::run_migrations(&pool).await?;
    tracing::info!("database migrations complete");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let notion_client = Arc::new(NotionClient::new(
        config.notion_api_key.clone(),
        config.notion_collections.clone(),
    ));
    let anki_client = Arc::new(AnkiConnectClient::new(config.ankiconnect_url.clone()));
    let llm_client = Arc::new(AnthropicLlmClient::new(
        config.llm_api_key.clone(),
        config.llm_model.clone(),
    ));

    let staging = Arc::new(StagingRepository::new(pool.clone()));
    let canonical = Arc::new(CanonicalRepository::new(pool.clone()));
    let checkpoints = Arc::new(CheckpointRepository::new(pool.clone()));
    let run_log = Arc::new(SyncRunRepository::new(pool.clone()));
    let review_queue = Arc::new(ReviewQueueRepository::new(pool.clone()));
    let duplicate_groups = Arc::new(DuplicateGroupRepository::new(pool.clone()));
    let stage_log = Arc::new(StageLogRepository::new(pool.clone()));

    let rate_limiter = Arc::new(TokenBucket::new(
        config.notion_rate_limit.requests_per_second,
        clock.as_ref(),
    ));

    let sync_engine = Arc::new(SyncEngine {
        notion: notion_client,
        staging: staging.clone(),
        checkpoints: checkpoints.clone(),
        run_log: run_log.clone(),
        clock: clock.clone(),
        rate_limiter,
    });

    let rewriter = Arc::new(Rewriter {
        canonical: canonical.clone(),
        review_queue: review_queue.clone(),
        llm: llm_client,
        quality_thresholds: quality_thresholds(&config.quality),
        analyzer_mode: analyzer_mode(&config.quality),
    });

    let orchestrator = Arc::new(Orchestrator {
        staging,
        canonical,
        review_queue: review_queue.clone(),
        duplicate_groups,
        stage_log,
        clock: clock.clone(),
        quality_thresholds: quality_thresholds(&config.quality),
        analyzer_mode: analyzer_mode(&config.quality),
        fuzzy_threshold: config.duplicate_fuzzy_threshold,
        rewriter: rewriter.clone(),
    });

    // `anki_client` is wired for the CLI's `sync anki-push`/`anki-pull`
    // commands; the HTTP surface (§6.4) has no Anki route of its own.
    let _ = anki_client;

    let state = Arc::new(AppState {
        pool,
        sync_engine,
        run_log,
        orchestrator,
        rewriter,
        review_queue,
        cancel_flags: Arc::new(DashMap::new()),
        config: config.clone(),
        start_time: Instant::now(),
    });

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!(bind_address = %config.bind_address, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
