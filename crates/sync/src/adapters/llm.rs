//! Anthropic Messages API client for the Rewriter's `LlmClient` port (§4.G,
//! out-of-scope collaborator per §1). Same thin-client shape as
//! [`super::notion::NotionClient`]: one HTTP call per port method, no
//! retry/rate-limiting of its own — that's the Sync Engine/Rewriter's job.

use std::time::Duration;

use async_trait::async_trait;
use cortex_domain::atom::QualityIssue;
use cortex_ports::{ImproveSuggestion, LlmClient, RewritePrompt, SplitSuggestion};
use serde::Deserialize;
use serde_json::json;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

pub struct AnthropicLlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicLlmClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string(), api_key, model)
    }

    pub fn with_base_url(base_url: String, api_key: String, model: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("reqwest client builds with static config");
        Self {
            http,
            base_url,
            api_key,
            model,
        }
    }

    async fn complete(&self, system: &str, user: &str) -> anyhow::Result<String> {
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": [{ "role": "user", "content": user }],
        });

        let response = self
            .http
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("anthropic request failed ({status}): {text}");
        }

        let parsed: MessagesResponse = response.json().await?;
        parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| anyhow::anyhow!("anthropic response had no text block"))
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImproveJson {
    front: String,
    back: String,
}

#[derive(Debug, Deserialize)]
struct SplitJson {
    atoms: Vec<ImproveJson>,
}

fn issues_text(issues: &[QualityIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{i:?}"))
        .collect::<Vec<_>>()
        .join(", ")
}

const IMPROVE_SYSTEM: &str = "You rewrite flashcard front/back pairs to fix the listed quality \
issues while preserving the original fact. Respond with JSON only: \
{\"front\": \"...\", \"back\": \"...\"}.";

const SPLIT_SYSTEM: &str = "You split a flashcard that enumerates multiple facts into one \
flashcard per fact. Respond with JSON only: {\"atoms\": [{\"front\": \"...\", \"back\": \"...\"}, ...]}.";

#[async_trait]
impl LlmClient for AnthropicLlmClient {
    async fn improve(&self, prompt: &RewritePrompt) -> anyhow::Result<ImproveSuggestion> {
        let user = format!(
            "front: {}\nback: {}\nissues: {}",
            prompt.front,
            prompt.back,
            issues_text(&prompt.issues)
        );
        let text = self.complete(IMPROVE_SYSTEM, &user).await?;
        let parsed: ImproveJson = serde_json::from_str(&text)?;
        Ok(ImproveSuggestion {
            front: parsed.front,
            back: parsed.back,
        })
    }

    async fn split(&self, prompt: &RewritePrompt) -> anyhow::Result<Vec<SplitSuggestion>> {
        let user = format!(
            "front: {}\nback: {}\nissues: {}",
            prompt.front,
            prompt.back,
            issues_text(&prompt.issues)
        );
        let text = self.complete(SPLIT_SYSTEM, &user).await?;
        let parsed: SplitJson = serde_json::from_str(&text)?;
        Ok(parsed
            .atoms
            .into_iter()
            .map(|a| SplitSuggestion {
                front: a.front,
                back: a.back,
            })
            .collect())
    }
}
