//! Postgres-backed `StagingStore` (§4.B, §4.C). `commit_batch` wraps the
//! whole batch in a transaction so a constraint failure on one record rolls
//! back the others, per §7.

use async_trait::async_trait;
use cortex_ports::{BatchCommitOutcome, StagingRecord, StagingStore};
use sqlx::PgPool;

pub struct StagingRepository {
    pool: PgPool,
}

impl StagingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StagingStore for StagingRepository {
    async fn commit_batch(
        &self,
        collection: &str,
        records: &[StagingRecord],
    ) -> anyhow::Result<BatchCommitOutcome> {
        let mut tx = self.pool.begin().await?;
        let mut outcome = BatchCommitOutcome::default();
        for record in records {
            // `xmax = 0` is true only for the row version just inserted by
            // this statement, distinguishing a fresh insert from an upsert.
            let (inserted,): (bool,) = sqlx::query_as(
                r#"
                INSERT INTO staging_records (collection, external_id, properties, external_last_edited, tombstoned)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (collection, external_id) DO UPDATE SET
                    properties = EXCLUDED.properties,
                    external_last_edited = EXCLUDED.external_last_edited,
                    tombstoned = EXCLUDED.tombstoned
                RETURNING (xmax = 0)
                "#,
            )
            .bind(collection)
            .bind(&record.external_id)
            .bind(&record.properties)
            .bind(record.external_last_edited)
            .bind(record.tombstoned)
            .fetch_one(&mut *tx)
            .await?;

            if inserted {
                outcome.created += 1;
            } else {
                outcome.updated += 1;
            }
        }
        tx.commit().await?;
        Ok(outcome)
    }

    async fn list_collection(&self, collection: &str) -> anyhow::Result<Vec<StagingRecord>> {
        let rows: Vec<(String, serde_json::Value, chrono::DateTime<chrono::Utc>, bool)> =
            sqlx::query_as(
                "SELECT external_id, properties, external_last_edited, tombstoned \
                 FROM staging_records WHERE collection = $1",
            )
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(
                |(external_id, properties, external_last_edited, tombstoned)| StagingRecord {
                    collection: collection.to_string(),
                    external_id,
                    properties,
                    external_last_edited,
                    tombstoned,
                },
            )
            .collect())
    }

    async fn mark_tombstoned(&self, collection: &str, seen_external_ids: &[String]) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE staging_records SET tombstoned = TRUE \
             WHERE collection = $1 AND NOT (external_id = ANY($2)) AND tombstoned = FALSE",
        )
        .bind(collection)
        .bind(seen_external_ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
