//! Domain types for the learning-content pipeline.

pub mod atom;
pub mod duplicate;
pub mod errors;
pub mod persona;
pub mod response;
pub mod review;
pub mod sync;

use serde::Serialize;

pub use atom::*;
pub use duplicate::*;
pub use errors::*;
pub use persona::*;
pub use response::*;
pub use review::*;
pub use sync::*;

/// Aggregate health of every component named in §1 Out-of-scope, rolled up
/// the way the teacher's `/v1/ready` rolls up `check_connection` (§6.4 `/health`).
#[derive(Debug, Serialize)]
pub struct HealthComponents {
    pub storage: &'static str,
    pub notion: &'static str,
    pub anki: &'static str,
    pub ai: &'static str,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub build_sha: String,
    pub uptime_seconds: u64,
    pub components: HealthComponents,
}
