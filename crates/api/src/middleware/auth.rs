//! Admin-key guard for the observability/clean/review surface. This spec has
//! no per-user authentication model (§1 lists no auth collaborator) — the
//! only gate is a shared admin key, the same `x-admin-key` extractor the
//! teacher used alongside its JWT `AuthUser`.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use cortex_domain::DomainError;

use crate::AppState;

pub struct AdminApiKey;

impl FromRequestParts<Arc<AppState>> for AdminApiKey {
    type Rejection = DomainError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let expected = state.config.admin_api_key.as_str();
        if expected.is_empty() {
            return Err(DomainError::Forbidden(
                "Admin endpoint is disabled".to_string(),
            ));
        }

        let provided = parts
            .headers
            .get("x-admin-key")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| DomainError::Unauthorized("Missing admin key".to_string()))?;

        if provided != expected {
            return Err(DomainError::Forbidden("Invalid admin key".to_string()));
        }

        Ok(Self)
    }
}
