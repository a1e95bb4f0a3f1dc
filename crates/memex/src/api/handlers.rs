use std::sync::Arc;

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::json_rejection;
use crate::error::MemexError;
use crate::memory::{IngestReport, IngestRequest, MemoryStats, Metadata, RetrievalQuery};

const DEFAULT_USER_ID: &str = "default";

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

#[derive(Debug, Deserialize)]
pub struct IngestBody {
    pub content: String,
    pub source_type: String,
    pub source_name: String,
    pub session_id: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Deserialize)]
pub struct RetrieveBody {
    pub query: String,
    pub session_id: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    pub top_k: Option<usize>,
    pub max_tokens: Option<usize>,
    #[serde(default)]
    pub filter: Metadata,
    #[serde(default)]
    pub format_prompt: bool,
}

#[derive(Debug, Serialize)]
pub struct RetrievedChunkView {
    pub id: Uuid,
    pub text: String,
    pub source_type: String,
    pub source_name: String,
    pub timestamp: DateTime<Utc>,
    pub relevance_score: f32,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub metadata: Metadata,
}

#[derive(Debug, Serialize)]
pub struct RetrieveResponse {
    pub chunks: Vec<RetrievedChunkView>,
    pub total_tokens: usize,
    pub query_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_context: Option<String>,
}

/// Clears are always scoped to one user; `user_id` falls back to the same
/// default as ingest and retrieve.
#[derive(Debug, Deserialize)]
pub struct ClearBody {
    pub session_id: Option<String>,
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared_count: usize,
}

/// Health check endpoint - unauthenticated
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "memex",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn ingest_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IngestBody>, JsonRejection>,
) -> Result<Json<IngestReport>, MemexError> {
    let Json(body) = payload.map_err(json_rejection)?;

    let report = state
        .manager
        .ingest(IngestRequest {
            content: body.content,
            source_type: body.source_type,
            source_name: body.source_name,
            session_id: body.session_id,
            user_id: body.user_id,
            metadata: body.metadata,
        })
        .await?;

    Ok(Json(report))
}

pub async fn retrieve_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RetrieveBody>, JsonRejection>,
) -> Result<Json<RetrieveResponse>, MemexError> {
    let Json(body) = payload.map_err(json_rejection)?;

    let result = state
        .manager
        .retrieve(RetrievalQuery {
            text: body.query,
            session_id: body.session_id,
            user_id: body.user_id,
            top_k: body.top_k.unwrap_or(state.retrieval.default_top_k),
            max_tokens: body.max_tokens.unwrap_or(state.retrieval.default_max_tokens),
            filter: body.filter,
        })
        .await?;

    let prompt_context = body
        .format_prompt
        .then(|| state.manager.optimizer().format_for_prompt(&result.chunks));

    let chunks = result
        .chunks
        .into_iter()
        .map(|retrieved| {
            let chunk = retrieved.chunk;
            RetrievedChunkView {
                id: chunk.id,
                text: chunk.text,
                source_type: chunk.source_type,
                source_name: chunk.source_name,
                timestamp: chunk.timestamp,
                relevance_score: retrieved.relevance_score,
                chunk_index: chunk.chunk_index,
                total_chunks: chunk.total_chunks,
                metadata: chunk.metadata,
            }
        })
        .collect();

    Ok(Json(RetrieveResponse {
        chunks,
        total_tokens: result.total_tokens,
        query_time_ms: result.query_time_ms,
        prompt_context,
    }))
}

pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<MemoryStats> {
    Json(state.manager.stats().await)
}

pub async fn clear_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ClearBody>, JsonRejection>,
) -> Result<Json<ClearResponse>, MemexError> {
    let Json(body) = payload.map_err(json_rejection)?;

    let cleared_count = state
        .manager
        .clear(body.session_id.as_deref(), Some(&body.user_id))
        .await?;

    Ok(Json(ClearResponse { cleared_count }))
}
