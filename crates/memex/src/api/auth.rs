//! Shared-secret authentication middleware
//!
//! Accepts the key in `x-api-key`, `api-key` or `Authorization: Bearer`.
//! Runs before body extraction, so unauthenticated requests have no effect.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use secrecy::ExposeSecret;
use subtle::ConstantTimeEq;

use crate::api::AppState;
use crate::error::MemexError;

const API_KEY_HEADERS: &[&str] = &["x-api-key", "api-key"];

/// Pull the presented key out of the request headers, if any.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    for name in API_KEY_HEADERS {
        if let Some(value) = headers.get(*name).and_then(|v| v.to_str().ok()) {
            return Some(value.trim());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        })
        .map(str::trim)
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, MemexError> {
    let Some(presented) = presented_key(request.headers()) else {
        tracing::warn!("Rejected {} {}: missing API key", request.method(), request.uri().path());
        return Err(MemexError::Auth("missing API key".to_string()));
    };

    if !constant_time_eq(
        presented.as_bytes(),
        state.api_key.expose_secret().as_bytes(),
    ) {
        tracing::warn!("Rejected {} {}: invalid API key", request.method(), request.uri().path());
        return Err(MemexError::Auth("invalid API key".to_string()));
    }

    Ok(next.run(request).await)
}
