//! API Module
//!
//! HTTP handlers and routing.
//!
//! # Endpoints
//! Peer router:
//! - `GET {base_path}:group/:key` - Raw value bytes, used by other nodes
//!
//! API router:
//! - `GET /api?key=` - Raw value bytes from this node's front-end group
//! - `GET /stats` - Counters of the front-end group
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::{create_api_router, create_peer_router};
