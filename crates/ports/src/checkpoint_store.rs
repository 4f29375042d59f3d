//! Sync checkpoint and audit-history ports (§3 SyncCheckpoint, §4.B).

use async_trait::async_trait;
use cortex_domain::sync::{SyncCheckpoint, SyncRun};

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, collection: &str) -> anyhow::Result<SyncCheckpoint>;
    async fn save(&self, checkpoint: &SyncCheckpoint) -> anyhow::Result<()>;
}

#[async_trait]
pub trait SyncRunLog: Send + Sync {
    async fn record(&self, run: &SyncRun) -> anyhow::Result<()>;
    async fn get(&self, sync_id: uuid::Uuid) -> anyhow::Result<Option<SyncRun>>;
    async fn history(&self, status: Option<&str>, limit: usize) -> anyhow::Result<Vec<SyncRun>>;
}
