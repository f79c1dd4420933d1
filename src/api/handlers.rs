//! API Handlers
//!
//! HTTP request handlers for the peer and front-end endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

use crate::cache::ByteView;
use crate::error::{CacheError, Result};
use crate::group::{Group, Registry};
use crate::models::{ApiQuery, HealthResponse, PeerQuery, StatsResponse};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Groups served to peers
    pub registry: Arc<Registry>,
    /// Group behind the front-end `/api` and `/stats` endpoints
    pub api_group: String,
}

impl AppState {
    pub fn new(registry: Arc<Registry>, api_group: impl Into<String>) -> Self {
        Self {
            registry,
            api_group: api_group.into(),
        }
    }

    fn group(&self, name: &str) -> Result<Arc<Group>> {
        self.registry
            .get_group(name)
            .ok_or_else(|| CacheError::GroupNotFound(name.to_string()))
    }
}

fn octet_stream(view: ByteView) -> Response {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        view.byte_slice(),
    )
        .into_response()
}

/// Handler for GET {base_path}:group/:key
///
/// Serves a group's value to another node.
pub async fn peer_handler(
    State(state): State<AppState>,
    Path((group, key)): Path<(String, String)>,
) -> Result<Response> {
    debug!(group = %group, key = %key, "peer request");
    let view = state.group(&group)?.get(&key).await?;
    Ok(octet_stream(view))
}

/// Handler for GET {base_path}?group=&key=
///
/// Same as [`peer_handler`] for names that are `.` or `..`.
pub async fn peer_query_handler(
    State(state): State<AppState>,
    Query(query): Query<PeerQuery>,
) -> Result<Response> {
    debug!(group = %query.group, key = %query.key, "peer request");
    let view = state.group(&query.group)?.get(&query.key).await?;
    Ok(octet_stream(view))
}

/// Handler for GET /api?key=
pub async fn api_handler(
    State(state): State<AppState>,
    Query(query): Query<ApiQuery>,
) -> Result<Response> {
    let view = state.group(&state.api_group)?.get(&query.key).await?;
    Ok(octet_stream(view))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let group = state.group(&state.api_group)?;
    Ok(Json(StatsResponse::new(group.name(), group.stats())))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
