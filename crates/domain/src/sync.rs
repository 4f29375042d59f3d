//! Sync engine types (§3 SyncCheckpoint, §4.B SyncRun).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Full,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Running,
    Completed,
    CompletedWithWarnings,
    Failed,
    Cancelled,
}

/// Per-collection sync checkpoint (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    pub collection: String,
    pub last_cursor: Option<String>,
    pub last_edited_watermark: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
}

impl SyncCheckpoint {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            last_cursor: None,
            last_edited_watermark: None,
            consecutive_failures: 0,
            last_success_at: None,
        }
    }
}

/// A single sync execution (§4.B "Emit a SyncRun record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub sync_id: Uuid,
    pub mode: SyncMode,
    pub collections: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: SyncStatus,
    pub created: u64,
    pub updated: u64,
    pub tombstoned: u64,
    pub error_message: Option<String>,
}

impl SyncRun {
    pub fn start(mode: SyncMode, collections: Vec<String>, now: DateTime<Utc>) -> Self {
        Self::start_with_id(Uuid::new_v4(), mode, collections, now)
    }

    /// Same as [`SyncRun::start`], but with a caller-assigned `sync_id` — the
    /// HTTP API generates one up front so `POST /api/sync/notion` can return
    /// `{sync_id}` before the run finishes (§6.4), the same convention
    /// `RunOptions::run_id` already uses for the cleaning pipeline.
    pub fn start_with_id(sync_id: Uuid, mode: SyncMode, collections: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            sync_id,
            mode,
            collections,
            started_at: now,
            completed_at: None,
            status: SyncStatus::Running,
            created: 0,
            updated: 0,
            tombstoned: 0,
            error_message: None,
        }
    }
}

/// Request body for `POST /api/sync/notion`.
#[derive(Debug, Deserialize)]
pub struct SyncNotionRequest {
    #[serde(default)]
    pub incremental: bool,
    #[serde(default)]
    pub databases: Vec<String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub parallel: bool,
}

#[derive(Debug, Serialize)]
pub struct SyncStartedResponse {
    pub sync_id: Uuid,
}
