//! Postgres-backed `StageLogStore` (§4.L `--resume`).

use async_trait::async_trait;
use cortex_ports::StageLogStore;
use sqlx::PgPool;
use uuid::Uuid;

pub struct StageLogRepository {
    pool: PgPool,
}

impl StageLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StageLogStore for StageLogRepository {
    async fn mark_completed(&self, run_id: Uuid, stage: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pipeline_stage_log (run_id, stage, completed_at)
            VALUES ($1, $2, now())
            ON CONFLICT (run_id, stage) DO UPDATE SET completed_at = EXCLUDED.completed_at
            "#,
        )
        .bind(run_id)
        .bind(stage)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn completed_stages(&self, run_id: Uuid) -> anyhow::Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT stage FROM pipeline_stage_log WHERE run_id = $1")
                .bind(run_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(stage,)| stage).collect())
    }
}
