//! API Routes
//!
//! Configures the Axum routers for peers and for front-end clients.

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    api_handler, health_handler, peer_handler, peer_query_handler, stats_handler, AppState,
};

/// Creates the router other nodes fetch values from.
///
/// `base_path` must start and end with `/`, e.g. `/_meshcache/`.
///
/// # Endpoints
/// - `GET {base_path}:group/:key`
/// - `GET {base_path}?group=&key=` for dot-segment names
pub fn create_peer_router(state: AppState, base_path: &str) -> Router {
    Router::new()
        .route(&format!("{base_path}:group/:key"), get(peer_handler))
        .route(base_path, get(peer_query_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Creates the front-end router.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_api_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api", get(api_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
