//! Thin Notion REST client (§4.A, §6.1). Interface fidelity matters more
//! than endpoint coverage here — only the one call the Sync Engine needs.
//!
//! The write-protection flag has nothing to veto on this adapter: the
//! `NotionAdapter` port exposes no mutating method at all, so a call path
//! that only reaches this client can never perform a write (§4.A, P8).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cortex_ports::{NotionAdapter, PageBatch, RawPage};
use serde::Deserialize;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct NotionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    database_ids: std::collections::HashMap<String, String>,
}

impl NotionClient {
    pub fn new(
        api_key: String,
        database_ids: std::collections::HashMap<String, String>,
    ) -> Self {
        Self::with_base_url("https://api.notion.com/v1".to_string(), api_key, database_ids)
    }

    pub fn with_base_url(
        base_url: String,
        api_key: String,
        database_ids: std::collections::HashMap<String, String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("reqwest client builds with static config");
        Self {
            http,
            base_url,
            api_key,
            database_ids,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<NotionPage>,
    next_cursor: Option<String>,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct NotionPage {
    id: String,
    properties: serde_json::Value,
    last_edited_time: DateTime<Utc>,
}

#[async_trait]
impl NotionAdapter for NotionClient {
    async fn list_pages(
        &self,
        collection: &str,
        since_watermark: Option<DateTime<Utc>>,
        cursor: Option<String>,
    ) -> anyhow::Result<PageBatch> {
        let database_id = self
            .database_ids
            .get(collection)
            .ok_or_else(|| anyhow::anyhow!("unconfigured Notion collection: {collection}"))?;

        let mut body = serde_json::json!({ "page_size": 100 });
        if let Some(cursor) = &cursor {
            body["start_cursor"] = serde_json::Value::String(cursor.clone());
        }
        if let Some(since) = since_watermark {
            body["filter"] = serde_json::json!({
                "timestamp": "last_edited_time",
                "last_edited_time": { "on_or_after": since.to_rfc3339() }
            });
        }

        let response = self
            .http
            .post(format!("{}/databases/{database_id}/query", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Notion-Version", "2022-06-28")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("notion query failed ({status}): {text}");
        }

        let parsed: QueryResponse = response.json().await?;
        let new_watermark = parsed.results.iter().map(|p| p.last_edited_time).max();

        Ok(PageBatch {
            pages: parsed
                .results
                .into_iter()
                .map(|p| RawPage {
                    external_id: p.id,
                    properties: p.properties,
                    external_last_edited: p.last_edited_time,
                })
                .collect(),
            next_cursor: if parsed.has_more { parsed.next_cursor } else { None },
            new_watermark,
        })
    }
}
