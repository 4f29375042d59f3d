//! Wires every concrete adapter the same way `cortex-server` does (§6.3 and
//! §6.4 share one set of components, just two different front doors).

use std::sync::Arc;

use cortex_config::AppConfig;
use cortex_core::quality::{AnalyzerMode, QualityThresholds};
use cortex_pipeline::{Orchestrator, Rewriter, StudyEngine};
use cortex_ports::{Clock, SystemClock};
use cortex_storage::{
    CanonicalRepository, CheckpointRepository, DuplicateGroupRepository, PersonaRepository,
    ReviewQueueRepository, ResponseRepository, StageLogRepository, StagingRepository,
    StruggleRepository, SyncRunRepository,
};
use cortex_sync::{AnkiConnectClient, AnthropicLlmClient, NotionClient, SyncEngine, TokenBucket};
use sqlx::PgPool;

pub fn quality_thresholds(cfg: &cortex_config::QualityThresholds) -> QualityThresholds {
    QualityThresholds {
        front_optimal_words: cfg.front_optimal_words as u32,
        front_max_words: cfg.front_max_words as u32,
        back_optimal_words: cfg.back_optimal_words as u32,
        back_warn_words: cfg.back_warn_words as u32,
        back_max_words: cfg.back_max_words as u32,
        back_max_chars: cfg.back_max_chars as u32,
    }
}

pub fn analyzer_mode(cfg: &cortex_config::QualityThresholds) -> AnalyzerMode {
    match cfg.mode {
        cortex_config::QualityMode::Relaxed => AnalyzerMode::Relaxed,
        cortex_config::QualityMode::Strict => AnalyzerMode::Strict,
    }
}

fn type_quotas(cfg: cortex_config::TypeQuotas) -> cortex_core::interleaver::TypeQuotas {
    cortex_core::interleaver::TypeQuotas {
        mcq: cfg.mcq,
        true_false: cfg.true_false,
        parsons: cfg.parsons,
        matching: cfg.matching,
    }
}

fn type_minimums(cfg: cortex_config::TypeMinimums) -> cortex_core::interleaver::TypeMinimums {
    cortex_core::interleaver::TypeMinimums {
        mcq: cfg.mcq,
        true_false: cfg.true_false,
        parsons: cfg.parsons,
        matching: cfg.matching,
    }
}

/// Everything a subcommand needs. Built once in `main` and handed to
/// whichever command the user picked.
pub struct Context {
    pub config: AppConfig,
    pub pool: PgPool,
    pub clock: Arc<dyn Clock>,
    pub canonical: Arc<CanonicalRepository>,
    pub staging: Arc<StagingRepository>,
    pub checkpoints: Arc<CheckpointRepository>,
    pub run_log: Arc<SyncRunRepository>,
    pub review_queue: Arc<ReviewQueueRepository>,
    pub duplicate_groups: Arc<DuplicateGroupRepository>,
    pub stage_log: Arc<StageLogRepository>,
    pub responses: Arc<ResponseRepository>,
    pub personas: Arc<PersonaRepository>,
    pub struggles: Arc<StruggleRepository>,
    pub notion: Arc<NotionClient>,
    pub anki: Arc<AnkiConnectClient>,
    pub llm: Arc<AnthropicLlmClient>,
}

impl Context {
    pub async fn load() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let pool = cortex_storage::create_pool(&config.database_url).await?;
        cortex_storage::run_migrations(&pool).await?;

        Ok(Self {
            clock: Arc::new(SystemClock),
            canonical: Arc::new(CanonicalRepository::new(pool.clone())),
            staging: Arc::new(StagingRepository::new(pool.clone())),
            checkpoints: Arc::new(CheckpointRepository::new(pool.clone())),
            run_log: Arc::new(SyncRunRepository::new(pool.clone())),
            review_queue: Arc::new(ReviewQueueRepository::new(pool.clone())),
            duplicate_groups: Arc::new(DuplicateGroupRepository::new(pool.clone())),
            stage_log: Arc::new(StageLogRepository::new(pool.clone())),
            responses: Arc::new(ResponseRepository::new(pool.clone())),
            personas: Arc::new(PersonaRepository::new(pool.clone())),
            struggles: Arc::new(StruggleRepository::new(pool.clone())),
            notion: Arc::new(NotionClient::new(
                config.notion_api_key.clone(),
                config.notion_collections.clone(),
            )),
            anki: Arc::new(AnkiConnectClient::new(config.ankiconnect_url.clone())),
            llm: Arc::new(AnthropicLlmClient::new(
                config.llm_api_key.clone(),
                config.llm_model.clone(),
            )),
            pool,
            config,
        })
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator {
            staging: self.staging.clone(),
            canonical: self.canonical.clone(),
            review_queue: self.review_queue.clone(),
            duplicate_groups: self.duplicate_groups.clone(),
            stage_log: self.stage_log.clone(),
            clock: self.clock.clone(),
            quality_thresholds: quality_thresholds(&self.config.quality),
            analyzer_mode: analyzer_mode(&self.config.quality),
            fuzzy_threshold: self.config.duplicate_fuzzy_threshold,
            rewriter: Arc::new(self.rewriter()),
        }
    }

    pub fn rewriter(&self) -> Rewriter {
        Rewriter {
            canonical: self.canonical.clone(),
            review_queue: self.review_queue.clone(),
            llm: self.llm.clone(),
            quality_thresholds: quality_thresholds(&self.config.quality),
            analyzer_mode: analyzer_mode(&self.config.quality),
        }
    }

    pub fn study_engine(&self) -> StudyEngine {
        StudyEngine {
            canonical: self.canonical.clone(),
            responses: self.responses.clone(),
            personas: self.personas.clone(),
            struggles: self.struggles.clone(),
            clock: self.clock.clone(),
            type_quotas: type_quotas(self.config.type_quotas),
            type_minimums: type_minimums(self.config.type_minimums),
        }
    }

    pub fn sync_engine(&self) -> Arc<SyncEngine> {
        Arc::new(SyncEngine {
            notion: self.notion.clone(),
            staging: self.staging.clone(),
            checkpoints: self.checkpoints.clone(),
            run_log: self.run_log.clone(),
            clock: self.clock.clone(),
            rate_limiter: Arc::new(TokenBucket::new(
                self.config.notion_rate_limit.requests_per_second,
                self.clock.as_ref(),
            )),
        })
    }
}
