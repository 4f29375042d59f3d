//! AnkiConnect JSON-RPC client (§4.A, §6.2). Not gated by write-protection:
//! that flag only vetoes the Notion adapter (§4.A).

use std::time::Duration;

use async_trait::async_trait;
use cortex_ports::{AnkiAdapter, AnkiCardStats, AnkiNote};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const ANKICONNECT_VERSION: u8 = 6;

pub struct AnkiConnectClient {
    http: reqwest::Client,
    endpoint: String,
}

impl AnkiConnectClient {
    pub fn new(endpoint: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("reqwest client builds with static config");
        Self { http, endpoint }
    }

    async fn invoke(&self, action: &str, params: Value) -> anyhow::Result<Value> {
        let request = RpcRequest {
            action: action.to_string(),
            version: ANKICONNECT_VERSION,
            params,
        };
        let response: RpcResponse = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            anyhow::bail!("AnkiConnect error on {action}: {error}");
        }
        response
            .result
            .ok_or_else(|| anyhow::anyhow!("AnkiConnect returned no result for {action}"))
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest {
    action: String,
    version: u8,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<String>,
}

#[async_trait]
impl AnkiAdapter for AnkiConnectClient {
    async fn list_notes(&self, deck: &str) -> anyhow::Result<Vec<AnkiNote>> {
        let note_ids: Vec<i64> = serde_json::from_value(
            self.invoke(
                "findNotes",
                serde_json::json!({ "query": format!("deck:\"{deck}\"") }),
            )
            .await?,
        )?;

        if note_ids.is_empty() {
            return Ok(Vec::new());
        }

        let notes_info: Vec<Value> = serde_json::from_value(
            self.invoke("notesInfo", serde_json::json!({ "notes": note_ids }))
                .await?,
        )?;

        Ok(notes_info
            .into_iter()
            .filter_map(|note| {
                let note_id = note.get("noteId")?.as_i64()?;
                let fields = note.get("fields")?.clone();
                Some(AnkiNote {
                    note_id,
                    deck: deck.to_string(),
                    fields,
                })
            })
            .collect())
    }

    async fn list_card_stats(&self, card_ids: &[i64]) -> anyhow::Result<Vec<AnkiCardStats>> {
        let cards_info: Vec<Value> = serde_json::from_value(
            self.invoke("cardsInfo", serde_json::json!({ "cards": card_ids }))
                .await?,
        )?;

        Ok(cards_info
            .into_iter()
            .filter_map(|card| {
                Some(AnkiCardStats {
                    card_id: card.get("cardId")?.as_i64()?,
                    factor: card.get("factor")?.as_i64()? as i32,
                    interval: card.get("interval")?.as_i64()? as i32,
                    reps: card.get("reps")?.as_u64()? as u32,
                    lapses: card.get("lapses")?.as_u64()? as u32,
                    due: card.get("due")?.as_i64()?,
                })
            })
            .collect())
    }

    async fn push_note(&self, deck: &str, fields: &Value) -> anyhow::Result<i64> {
        let result = self
            .invoke(
                "addNote",
                serde_json::json!({
                    "note": {
                        "deckName": deck,
                        "modelName": "Basic",
                        "fields": fields,
                        "options": { "allowDuplicate": false },
                    }
                }),
            )
            .await?;
        result
            .as_i64()
            .ok_or_else(|| anyhow::anyhow!("addNote returned a non-integer note id"))
    }

    async fn update_note_fields(&self, note_id: i64, fields: &Value) -> anyhow::Result<()> {
        self.invoke(
            "updateNoteFields",
            serde_json::json!({ "note": { "id": note_id, "fields": fields } }),
        )
        .await?;
        Ok(())
    }
}
