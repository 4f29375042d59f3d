//! Staging store port (§3, §4.C). Raw landing zone keyed by `(collection,
//! external_id)`, single-writer per collection (§5).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct StagingRecord {
    pub collection: String,
    pub external_id: String,
    pub properties: Value,
    pub external_last_edited: DateTime<Utc>,
    pub tombstoned: bool,
}

/// Insert-vs-update split for a committed batch, so callers (the Sync
/// Engine's `SyncRun.created`/`updated`, §3, §4.B) can tell new records from
/// re-synced ones instead of counting every record as an update.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchCommitOutcome {
    pub created: u64,
    pub updated: u64,
}

#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Writes a batch atomically; the whole batch rolls back on constraint
    /// failure (§4.B, §7).
    async fn commit_batch(
        &self,
        collection: &str,
        records: &[StagingRecord],
    ) -> anyhow::Result<BatchCommitOutcome>;

    async fn list_collection(&self, collection: &str) -> anyhow::Result<Vec<StagingRecord>>;

    /// Marks records absent from a full pull's external-id set as tombstoned,
    /// without deleting them (§4.C).
    async fn mark_tombstoned(&self, collection: &str, seen_external_ids: &[String]) -> anyhow::Result<u64>;
}
