//! Postgres-backed `ReviewQueueStore` (§3 ReviewQueueItem, §4.G).

use async_trait::async_trait;
use cortex_domain::review::{ReviewQueueItem, ReviewStatus};
use cortex_ports::ReviewQueueStore;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

pub struct ReviewQueueRepository {
    pool: PgPool,
}

impl ReviewQueueRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn status_tag(status: ReviewStatus) -> &'static str {
    match status {
        ReviewStatus::Pending => "pending",
        ReviewStatus::Approved => "approved",
        ReviewStatus::Rejected => "rejected",
        ReviewStatus::Edited => "edited",
        ReviewStatus::Error => "error",
    }
}

#[async_trait]
impl ReviewQueueStore for ReviewQueueRepository {
    async fn insert(&self, item: ReviewQueueItem) -> anyhow::Result<ReviewQueueItem> {
        sqlx::query(
            r#"
            INSERT INTO review_queue_items (id, source_atom_id, status, created_at, data)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(item.id)
        .bind(item.source_atom_id)
        .bind(status_tag(item.status))
        .bind(item.created_at)
        .bind(Json(&item))
        .execute(&self.pool)
        .await?;
        Ok(item)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<ReviewQueueItem>> {
        let row: Option<(Json<ReviewQueueItem>,)> =
            sqlx::query_as("SELECT data FROM review_queue_items WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(Json(item),)| item))
    }

    async fn list(&self, status: Option<ReviewStatus>) -> anyhow::Result<Vec<ReviewQueueItem>> {
        let rows: Vec<(Json<ReviewQueueItem>,)> = match status {
            Some(status) => {
                sqlx::query_as(
                    "SELECT data FROM review_queue_items WHERE status = $1 ORDER BY created_at",
                )
                .bind(status_tag(status))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT data FROM review_queue_items ORDER BY created_at")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows.into_iter().map(|(Json(item),)| item).collect())
    }

    async fn update(&self, item: ReviewQueueItem) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE review_queue_items SET status = $1, data = $2 WHERE id = $3",
        )
        .bind(status_tag(item.status))
        .bind(Json(&item))
        .bind(item.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
