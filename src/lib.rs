//! Meshcache - A distributed read-through cache
//!
//! Groups serve keys from a byte-bounded LRU tier, from the peer that owns
//! the key on a consistent hash ring, or from a caller-supplied data source.
//! Concurrent misses for the same key are collapsed into a single load.

pub mod api;
pub mod cache;
pub mod config;
pub mod consistenthash;
pub mod error;
pub mod group;
pub mod models;
pub mod peers;
pub mod singleflight;

pub use api::AppState;
pub use cache::ByteView;
pub use config::Config;
pub use error::{CacheError, Result};
pub use group::{Getter, Group, Registry};
pub use peers::{HttpPool, PeerGetter, PeerPicker};
