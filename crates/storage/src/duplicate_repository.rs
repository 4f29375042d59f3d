//! Postgres-backed `DuplicateGroupStore` (§3 DuplicateGroup, §4.F).
//!
//! Groups marked `resolved` are preserved but excluded from re-detection
//! by the caller (the detector itself is given only `list(Open)` groups).

use async_trait::async_trait;
use cortex_domain::duplicate::{DuplicateGroup, DuplicateStatus};
use cortex_ports::DuplicateGroupStore;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

pub struct DuplicateGroupRepository {
    pool: PgPool,
}

impl DuplicateGroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn status_tag(status: DuplicateStatus) -> &'static str {
    match status {
        DuplicateStatus::Open => "open",
        DuplicateStatus::Resolved => "resolved",
    }
}

#[async_trait]
impl DuplicateGroupStore for DuplicateGroupRepository {
    async fn upsert_groups(&self, groups: Vec<DuplicateGroup>) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for group in &groups {
            sqlx::query(
                r#"
                INSERT INTO duplicate_groups (id, status, data)
                VALUES ($1, $2, $3)
                ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, data = EXCLUDED.data
                "#,
            )
            .bind(group.id)
            .bind(status_tag(group.status))
            .bind(Json(group))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list(&self, status: Option<DuplicateStatus>) -> anyhow::Result<Vec<DuplicateGroup>> {
        let rows: Vec<(Json<DuplicateGroup>,)> = match status {
            Some(status) => {
                sqlx::query_as("SELECT data FROM duplicate_groups WHERE status = $1")
                    .bind(status_tag(status))
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT data FROM duplicate_groups")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows.into_iter().map(|(Json(group),)| group).collect())
    }

    async fn resolve(&self, id: Uuid, canonical_atom_id: Uuid) -> anyhow::Result<()> {
        let row: Option<(Json<DuplicateGroup>,)> =
            sqlx::query_as("SELECT data FROM duplicate_groups WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        let Some((Json(mut group),)) = row else {
            return Ok(());
        };
        group.status = DuplicateStatus::Resolved;
        group.canonical_atom_id = Some(canonical_atom_id);

        sqlx::query("UPDATE duplicate_groups SET status = $1, data = $2 WHERE id = $3")
            .bind(status_tag(group.status))
            .bind(Json(&group))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
