//! Generative LLM port (§4.G Rewriter, out-of-scope collaborator per §1).

use async_trait::async_trait;

use cortex_domain::atom::QualityIssue;

#[derive(Debug, Clone)]
pub struct RewritePrompt {
    pub front: String,
    pub back: String,
    pub issues: Vec<QualityIssue>,
}

#[derive(Debug, Clone)]
pub struct ImproveSuggestion {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone)]
pub struct SplitSuggestion {
    pub front: String,
    pub back: String,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn improve(&self, prompt: &RewritePrompt) -> anyhow::Result<ImproveSuggestion>;
    async fn split(&self, prompt: &RewritePrompt) -> anyhow::Result<Vec<SplitSuggestion>>;
}
