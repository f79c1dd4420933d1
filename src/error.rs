//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// Cloneable so one load outcome can be handed to every caller waiting on
/// the same key.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Lookups require a non-empty key
    #[error("key is required")]
    EmptyKey,

    /// The data source has no value for the key
    #[error("{0} not exist")]
    NotFound(String),

    /// The data source failed
    #[error("{0}")]
    Source(Arc<anyhow::Error>),

    /// A remote peer could not serve the key
    #[error("peer fetch failed: {0}")]
    Peer(String),

    /// The load for a key did not finish within the configured deadline
    #[error("loading {key} timed out after {after:?}")]
    Timeout { key: String, after: Duration },

    /// A group with this name is already registered
    #[error("group {0} already exists")]
    GroupExists(String),

    /// No group with this name is registered
    #[error("no such group: {0}")]
    GroupNotFound(String),

    /// A peer picker was registered twice on the same group
    #[error("peers already registered for group {0}")]
    PeersAlreadyRegistered(String),
}

impl From<anyhow::Error> for CacheError {
    fn from(err: anyhow::Error) -> Self {
        CacheError::Source(Arc::new(err))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::EmptyKey => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) | CacheError::GroupNotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CacheError::Peer(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
