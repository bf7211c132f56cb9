use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use crate::api::response::ApiError;
use crate::identity::{Actor, IdentityProvider, TokenIdentity};
use crate::AppState;

/// Pull the token out of an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Whoever sent the request, possibly nobody. Never rejects; operations
/// decide themselves what an anonymous caller may do.
pub struct Caller(pub TokenIdentity);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, ApiError> {
        Ok(Caller(state.config.admin_tokens.identify(bearer_token(parts))))
    }
}

/// An authenticated admin operator. Rejects with 401 otherwise.
pub struct RequireAdmin(pub Actor);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, ApiError> {
        state
            .config
            .admin_tokens
            .identify(bearer_token(parts))
            .current_actor()
            .map(RequireAdmin)
            .ok_or_else(|| ApiError::unauthorized("A valid admin bearer token is required"))
    }
}
