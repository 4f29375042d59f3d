//! Pipeline stage log (§4.L `--resume`). Records which stages of a cleaning
//! run have completed so a resumed run can skip them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StageRecord {
    pub run_id: Uuid,
    pub stage: String,
    pub completed_at: DateTime<Utc>,
}

#[async_trait]
pub trait StageLogStore: Send + Sync {
    async fn mark_completed(&self, run_id: Uuid, stage: &str) -> anyhow::Result<()>;
    async fn completed_stages(&self, run_id: Uuid) -> anyhow::Result<Vec<String>>;
}
