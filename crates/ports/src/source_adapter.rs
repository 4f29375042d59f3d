//! Source adapter ports (§4.A). Only the interfaces are specified here;
//! concrete Notion/AnkiConnect clients live in the `sync` crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// One raw record pulled from an external collection, prior to Transform.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub external_id: String,
    pub properties: Value,
    pub external_last_edited: DateTime<Utc>,
}

/// A single page of a paginated pull.
#[derive(Debug, Clone)]
pub struct PageBatch {
    pub pages: Vec<RawPage>,
    pub next_cursor: Option<String>,
    /// The newest `external_last_edited` watermark observed in this batch.
    pub new_watermark: Option<DateTime<Utc>>,
}

/// Notion-style paginated content source (§4.A, §6.1).
#[async_trait]
pub trait NotionAdapter: Send + Sync {
    /// Lists one page of a collection. Pass `since_watermark` for an
    /// incremental pull; omit it for a full pull.
    async fn list_pages(
        &self,
        collection: &str,
        since_watermark: Option<DateTime<Utc>>,
        cursor: Option<String>,
    ) -> anyhow::Result<PageBatch>;
}

#[derive(Debug, Clone)]
pub struct AnkiNote {
    pub note_id: i64,
    pub deck: String,
    pub fields: Value,
}

#[derive(Debug, Clone, Copy)]
pub struct AnkiCardStats {
    pub card_id: i64,
    pub factor: i32,
    pub interval: i32,
    pub reps: u32,
    pub lapses: u32,
    pub due: i64,
}

/// AnkiConnect JSON-RPC client port (§4.A, §6.2).
#[async_trait]
pub trait AnkiAdapter: Send + Sync {
    async fn list_notes(&self, deck: &str) -> anyhow::Result<Vec<AnkiNote>>;
    async fn list_card_stats(&self, card_ids: &[i64]) -> anyhow::Result<Vec<AnkiCardStats>>;
    /// Mutating: creates a note in Anki. Not gated by write-protection — that
    /// flag only vetoes the Notion adapter (§4.A).
    async fn push_note(&self, deck: &str, fields: &Value) -> anyhow::Result<i64>;
    async fn update_note_fields(&self, note_id: i64, fields: &Value) -> anyhow::Result<()>;
}
