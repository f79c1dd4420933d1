//! Cache Module
//!
//! Local tier building blocks: the immutable value view, the byte-bounded
//! LRU cache, its locked wrapper and the group counters.

mod byteview;
pub mod lru;
mod local;
mod stats;


// Re-export public types
pub use byteview::ByteView;
pub use local::{EvictionListener, LocalCache};
pub use stats::{CacheStats, StatsSnapshot};
