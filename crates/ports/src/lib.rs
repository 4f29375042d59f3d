//! Trait interfaces for every external collaborator named in spec §1
//! Out-of-scope: Notion, AnkiConnect, a generative LLM, PostgreSQL-backed
//! storage, and the system clock. `crates/core` and `crates/pipeline` depend
//! only on these traits, never on a concrete database or HTTP client type.

pub mod canonical_store;
pub mod checkpoint_store;
pub mod clock;
pub mod llm_client;
pub mod response_store;
pub mod review_store;
pub mod source_adapter;
pub mod stage_log;
pub mod staging_store;
pub mod write_protection;

pub use canonical_store::*;
pub use checkpoint_store::*;
pub use clock::*;
pub use llm_client::*;
pub use response_store::*;
pub use review_store::*;
pub use source_adapter::*;
pub use stage_log::*;
pub use staging_store::*;
pub use write_protection::*;
