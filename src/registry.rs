//! Registry binding logical scopes to their ring and physical collections.
//!
//! The registry is populated once when a session starts and is only read
//! afterwards, so lookups need no locking.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::client::CollectionLink;
use crate::error::{ConfigError, Result, RoutingError};
use crate::partition::HashRing;

/// A physical collection taking part in a partitioning scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionDescriptor {
    /// Collection id, as used on the ring.
    pub id: String,
    /// Locator of the physical storage.
    pub link: CollectionLink,
}

impl CollectionDescriptor {
    /// Creates a descriptor.
    pub fn new(id: impl Into<String>, link: CollectionLink) -> Self {
        Self {
            id: id.into(),
            link,
        }
    }
}

/// Ring and collection set registered for one scope.
#[derive(Debug, Clone)]
pub struct ScopeEntry {
    /// Ring used to route keys.
    pub ring: Arc<HashRing>,
    /// Every collection in the scope, in registration order.
    pub collections: Arc<[CollectionDescriptor]>,
}

impl ScopeEntry {
    /// Returns the descriptor with the given id.
    pub fn collection(&self, id: &str) -> Option<&CollectionDescriptor> {
        self.collections.iter().find(|c| c.id == id)
    }
}

/// Maps scope ids (one per logical database) to their partitioning.
#[derive(Debug, Default)]
pub struct CollectionRegistry {
    scopes: HashMap<String, ScopeEntry>,
}

impl CollectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `scope_id` to a ring and its collections.
    ///
    /// # Errors
    /// Fails with a configuration error if the scope is already registered,
    /// the collection set is empty, a collection id repeats, or the ring and
    /// collection set do not name exactly the same collections.
    pub fn register(
        &mut self,
        scope_id: impl Into<String>,
        ring: Arc<HashRing>,
        collections: Vec<CollectionDescriptor>,
    ) -> Result<()> {
        let scope_id = scope_id.into();
        if self.scopes.contains_key(&scope_id) {
            return Err(ConfigError::ScopeAlreadyRegistered(scope_id).into());
        }
        if collections.is_empty() {
            return Err(ConfigError::EmptyCollectionSet.into());
        }

        let mut ids = HashSet::with_capacity(collections.len());
        for collection in &collections {
            if !ids.insert(collection.id.as_str()) {
                return Err(ConfigError::DuplicateCollection(collection.id.clone()).into());
            }
            if !ring.contains_owner(&collection.id) {
                return Err(ConfigError::InconsistentRing(collection.id.clone()).into());
            }
        }
        if let Some(owner) = ring.owners().iter().find(|owner| !ids.contains(owner.as_str())) {
            return Err(ConfigError::InconsistentRing(owner.clone()).into());
        }

        self.scopes.insert(
            scope_id,
            ScopeEntry {
                ring,
                collections: collections.into(),
            },
        );
        Ok(())
    }

    /// Returns the ring and collections for `scope_id`.
    pub fn resolve(&self, scope_id: &str) -> Result<ScopeEntry> {
        self.scopes
            .get(scope_id)
            .cloned()
            .ok_or_else(|| RoutingError::UnknownScope(scope_id.to_string()).into())
    }

    /// Returns true if `scope_id` is registered.
    pub fn contains(&self, scope_id: &str) -> bool {
        self.scopes.contains_key(scope_id)
    }

    /// Iterates over the registered scope ids.
    pub fn scope_ids(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }
}
