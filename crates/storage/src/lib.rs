//! Postgres/SQLx storage adapters implementing the `cortex_ports` traits
//! (§3 persisted state layout, §6.6).

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub mod canonical_repository;
pub mod checkpoint_repository;
pub mod duplicate_repository;
pub mod error;
pub mod response_repository;
pub mod review_repository;
pub mod stage_log_repository;
pub mod staging_repository;

pub use canonical_repository::CanonicalRepository;
pub use checkpoint_repository::{CheckpointRepository, SyncRunRepository};
pub use duplicate_repository::DuplicateGroupRepository;
pub use error::StorageError;
pub use response_repository::{PersonaRepository, ResponseRepository, StruggleRepository};
pub use review_repository::ReviewQueueRepository;
pub use stage_log_repository::StageLogRepository;
pub use staging_repository::StagingRepository;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool, StorageError> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(StorageError::Connection)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::migrate!("migrations")
        .run(pool)
        .await
        .map_err(StorageError::Migration)
}

/// Check database connectivity.
pub async fn check_connection(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(StorageError::Query)?;
    Ok(())
}
