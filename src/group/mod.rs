//! Group Module
//!
//! A group is a named cache namespace: a local tier, a data source for
//! misses, optional peers, and a deduplicator for concurrent loads.

mod getter;
mod cache_group;
mod registry;

pub use getter::Getter;
pub use cache_group::Group;
pub use registry::Registry;
