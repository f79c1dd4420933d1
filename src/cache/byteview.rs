//! Byte View Module
//!
//! Immutable view over a cached byte payload.

use std::fmt;
use std::sync::Arc;

use crate::cache::lru::Value;

// == Byte View ==
/// An immutable view of bytes.
///
/// Clones share the same buffer. Every accessor that hands bytes out
/// returns a copy, so holders can never change a cached value.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ByteView {
    b: Arc<[u8]>,
}

impl ByteView {
    /// Wraps a copy of `bytes`.
    pub fn copy_from(bytes: &[u8]) -> Self {
        Self { b: Arc::from(bytes) }
    }

    /// Length of the view in bytes.
    pub fn len(&self) -> usize {
        self.b.len()
    }

    pub fn is_empty(&self) -> bool {
        self.b.is_empty()
    }

    /// Returns a copy of the data as an owned byte vector.
    pub fn byte_slice(&self) -> Vec<u8> {
        self.b.to_vec()
    }
}

// Takes ownership of the buffer without copying; nothing else can reach it.
impl From<Vec<u8>> for ByteView {
    fn from(bytes: Vec<u8>) -> Self {
        Self { b: Arc::from(bytes) }
    }
}

impl From<&str> for ByteView {
    fn from(s: &str) -> Self {
        Self::copy_from(s.as_bytes())
    }
}

impl Value for ByteView {
    fn len(&self) -> usize {
        self.b.len()
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.b))
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView")
            .field("len", &self.b.len())
            .field("data", &String::from_utf8_lossy(&self.b))
            .finish()
    }
}
