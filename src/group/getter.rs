//! Data source consulted when a key is neither cached nor owned by a peer.

use async_trait::async_trait;

use crate::error::Result;

/// Loads the value for a key from the source of truth.
#[async_trait]
pub trait Getter: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
}

/// Plain functions and closures are getters.
#[async_trait]
impl<F> Getter for F
where
    F: Fn(&str) -> Result<Vec<u8>> + Send + Sync,
{
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self(key)
    }
}
