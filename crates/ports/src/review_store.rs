//! Review queue and duplicate-group storage ports (§3, §4.F, §4.G).

use async_trait::async_trait;
use cortex_domain::duplicate::{DuplicateGroup, DuplicateStatus};
use cortex_domain::review::{ReviewQueueItem, ReviewStatus};
use uuid::Uuid;

#[async_trait]
pub trait ReviewQueueStore: Send + Sync {
    async fn insert(&self, item: ReviewQueueItem) -> anyhow::Result<ReviewQueueItem>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<ReviewQueueItem>>;
    async fn list(&self, status: Option<ReviewStatus>) -> anyhow::Result<Vec<ReviewQueueItem>>;
    async fn update(&self, item: ReviewQueueItem) -> anyhow::Result<()>;
}

#[async_trait]
pub trait DuplicateGroupStore: Send + Sync {
    async fn upsert_groups(&self, groups: Vec<DuplicateGroup>) -> anyhow::Result<()>;
    async fn list(&self, status: Option<DuplicateStatus>) -> anyhow::Result<Vec<DuplicateGroup>>;
    async fn resolve(&self, id: Uuid, canonical_atom_id: uuid::Uuid) -> anyhow::Result<()>;
}
