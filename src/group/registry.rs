//! Group Registry
//!
//! Name -> group table. Construct one at startup and share it with
//! everything that looks groups up.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::error::{CacheError, Result};
use crate::group::{Getter, Group};

// == Registry ==
#[derive(Default)]
pub struct Registry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // == Create Group ==
    /// Creates and registers a group. Names are unique; registering a name
    /// twice fails with [`CacheError::GroupExists`].
    pub fn create_group(
        &self,
        name: impl Into<String>,
        cache_bytes: usize,
        getter: impl Getter + 'static,
    ) -> Result<Arc<Group>> {
        self.register(Group::new(name, cache_bytes, getter))
    }

    /// Registers an already configured group.
    pub fn register(&self, group: Group) -> Result<Arc<Group>> {
        let mut groups = self.groups.write();
        if groups.contains_key(group.name()) {
            return Err(CacheError::GroupExists(group.name().to_string()));
        }

        let group = Arc::new(group);
        groups.insert(group.name().to_string(), Arc::clone(&group));
        info!(group = %group.name(), "group registered");
        Ok(group)
    }

    // == Get Group ==
    /// Returns the named group, or None if no such group exists.
    pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Registered group names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("groups", &self.names())
            .finish()
    }
}
