//! Postgres-backed `CheckpointStore` and `SyncRunLog` (§3 SyncCheckpoint, §4.B).

use async_trait::async_trait;
use cortex_domain::sync::{SyncCheckpoint, SyncRun};
use cortex_ports::{CheckpointStore, SyncRunLog};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

pub struct CheckpointRepository {
    pool: PgPool,
}

impl CheckpointRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckpointStore for CheckpointRepository {
    async fn get(&self, collection: &str) -> anyhow::Result<SyncCheckpoint> {
        let row: Option<(Option<String>, Option<chrono::DateTime<chrono::Utc>>, i32, Option<chrono::DateTime<chrono::Utc>>)> =
            sqlx::query_as(
                "SELECT last_cursor, last_edited_watermark, consecutive_failures, last_success_at \
                 FROM sync_checkpoints WHERE collection = $1",
            )
            .bind(collection)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some((last_cursor, last_edited_watermark, consecutive_failures, last_success_at)) => {
                SyncCheckpoint {
                    collection: collection.to_string(),
                    last_cursor,
                    last_edited_watermark,
                    consecutive_failures: consecutive_failures as u32,
                    last_success_at,
                }
            }
            None => SyncCheckpoint::new(collection),
        })
    }

    async fn save(&self, checkpoint: &SyncCheckpoint) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_checkpoints (collection, last_cursor, last_edited_watermark, consecutive_failures, last_success_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (collection) DO UPDATE SET
                last_cursor = EXCLUDED.last_cursor,
                last_edited_watermark = EXCLUDED.last_edited_watermark,
                consecutive_failures = EXCLUDED.consecutive_failures,
                last_success_at = EXCLUDED.last_success_at
            "#,
        )
        .bind(&checkpoint.collection)
        .bind(&checkpoint.last_cursor)
        .bind(checkpoint.last_edited_watermark)
        .bind(checkpoint.consecutive_failures as i32)
        .bind(checkpoint.last_success_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub struct SyncRunRepository {
    pool: PgPool,
}

impl SyncRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn status_tag(status: cortex_domain::sync::SyncStatus) -> &'static str {
    use cortex_domain::sync::SyncStatus::*;
    match status {
        Running => "running",
        Completed => "completed",
        CompletedWithWarnings => "completed_with_warnings",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

#[async_trait]
impl SyncRunLog for SyncRunRepository {
    async fn record(&self, run: &SyncRun) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_runs (sync_id, status, started_at, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (sync_id) DO UPDATE SET status = EXCLUDED.status, data = EXCLUDED.data
            "#,
        )
        .bind(run.sync_id)
        .bind(status_tag(run.status))
        .bind(run.started_at)
        .bind(Json(run))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, sync_id: Uuid) -> anyhow::Result<Option<SyncRun>> {
        let row: Option<(Json<SyncRun>,)> =
            sqlx::query_as("SELECT data FROM sync_runs WHERE sync_id = $1")
                .bind(sync_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(Json(run),)| run))
    }

    async fn history(&self, status: Option<&str>, limit: usize) -> anyhow::Result<Vec<SyncRun>> {
        let rows: Vec<(Json<SyncRun>,)> = match status {
            Some(status) => {
                sqlx::query_as(
                    "SELECT data FROM sync_runs WHERE status = $1 ORDER BY started_at DESC LIMIT $2",
                )
                .bind(status)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT data FROM sync_runs ORDER BY started_at DESC LIMIT $1")
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows.into_iter().map(|(Json(run),)| run).collect())
    }
}
