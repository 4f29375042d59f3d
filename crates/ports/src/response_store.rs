//! Response log, persona, and struggle-signal ports (§3, §4.H, §4.K).

use async_trait::async_trait;
use cortex_domain::atom::AtomId;
use cortex_domain::persona::{LearnerPersona, StruggleSignal};
use cortex_domain::response::Response;

#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Append-only write (§3, §5 "Per atom, responses are applied in
    /// timestamp order").
    async fn append(&self, response: Response) -> anyhow::Result<()>;

    async fn history_for_atom(&self, atom_id: AtomId, limit: usize) -> anyhow::Result<Vec<Response>>;

    async fn history_for_section(&self, section_id: &str) -> anyhow::Result<Vec<Response>>;
}

#[async_trait]
pub trait PersonaStore: Send + Sync {
    async fn get(&self, learner_id: &str) -> anyhow::Result<LearnerPersona>;
    async fn save(&self, learner_id: &str, persona: &LearnerPersona) -> anyhow::Result<()>;
}

#[async_trait]
pub trait StruggleStore: Send + Sync {
    async fn save_all(&self, signals: Vec<StruggleSignal>) -> anyhow::Result<()>;
    async fn list(&self) -> anyhow::Result<Vec<StruggleSignal>>;
}
