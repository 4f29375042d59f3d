//! Sync Engine (§4.B), its supporting token-bucket rate limiter and
//! retry-with-backoff helper, and the concrete Notion/AnkiConnect/LLM HTTP
//! clients (§6.1, §6.2, §4.G).

pub mod adapters;
pub mod engine;
pub mod rate_limiter;
pub mod retry;

pub use adapters::anki::AnkiConnectClient;
pub use adapters::llm::AnthropicLlmClient;
pub use adapters::notion::NotionClient;
pub use engine::{SyncEngine, BATCH_SIZE};
pub use rate_limiter::TokenBucket;
pub use retry::{retry as retry_with_backoff, Retryable, BACKOFF_FACTOR, BASE_DELAY_MS, MAX_ATTEMPTS};
