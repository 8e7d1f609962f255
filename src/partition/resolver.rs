//! Partition resolver: key extraction plus ring lookup.
//!
//! A resolver composes three pieces:
//! - a key extractor supplied per document type,
//! - the scope's [`HashRing`] and collection set,
//! - an optional [`RouteObserver`] notified of write routing decisions.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::client::Document;
use crate::error::{Result, RoutingError};
use crate::partition::key::PartitionKey;
use crate::partition::ring::HashRing;
use crate::registry::{CollectionDescriptor, ScopeEntry};

/// Derives the partition key of a document.
pub type KeyExtractor = Arc<dyn Fn(&Document) -> Option<PartitionKey> + Send + Sync>;

/// Receives the outcome of every write routing decision.
///
/// Observers are for diagnostics only; they cannot influence routing.
pub trait RouteObserver: Send + Sync {
    /// Called after `key` was routed to `collection` for a create.
    fn routed(&self, key: &PartitionKey, collection: &CollectionDescriptor);
}

/// Observer that logs each routing decision at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRouteObserver;

impl RouteObserver for TracingRouteObserver {
    fn routed(&self, key: &PartitionKey, collection: &CollectionDescriptor) {
        info!(partition = %key, bucket = %collection.id, "partition goes to bucket");
    }
}

/// Extractor reading a top-level document field as the partition key.
///
/// Strings and integers are accepted; any other value type yields no key.
pub fn field_extractor(field: impl Into<String>) -> KeyExtractor {
    let field = field.into();
    Arc::new(move |document: &Document| match document.get(&field)? {
        serde_json::Value::String(s) => Some(PartitionKey::Str(s.clone())),
        serde_json::Value::Number(n) => n.as_i64().map(PartitionKey::Int),
        _ => None,
    })
}

/// Routes documents of one scope to physical collections.
#[derive(Clone)]
pub struct PartitionResolver {
    ring: Arc<HashRing>,
    collections: Arc<[CollectionDescriptor]>,
    extractor: KeyExtractor,
    observer: Option<Arc<dyn RouteObserver>>,
}

impl PartitionResolver {
    /// Creates a resolver over a ring and its collections.
    pub fn new(
        ring: Arc<HashRing>,
        collections: Arc<[CollectionDescriptor]>,
        extractor: KeyExtractor,
    ) -> Self {
        Self {
            ring,
            collections,
            extractor,
            observer: None,
        }
    }

    /// Creates a resolver for a registered scope.
    pub fn for_scope(entry: ScopeEntry, extractor: KeyExtractor) -> Self {
        Self::new(entry.ring, entry.collections, extractor)
    }

    /// Attaches a diagnostic observer.
    pub fn with_observer(mut self, observer: Arc<dyn RouteObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Extracts the partition key of `document`.
    pub fn partition_key(&self, document: &Document) -> Option<PartitionKey> {
        (self.extractor)(document)
    }

    /// Returns the single collection a document with `key` is written to.
    ///
    /// # Errors
    /// Fails with [`RoutingError::UnknownOwner`] if the ring names a collection
    /// that is not part of this resolver's collection set.
    pub fn resolve_for_create(&self, key: &PartitionKey) -> Result<&CollectionDescriptor> {
        let collection = self.locate(key)?;
        if let Some(observer) = &self.observer {
            observer.routed(key, collection);
        }
        Ok(collection)
    }

    /// Returns the collections to query for `key`.
    ///
    /// A known key yields the same singleton as [`resolve_for_create`](Self::resolve_for_create);
    /// `None` yields every collection for a fan-out read.
    pub fn resolve_for_read(&self, key: Option<&PartitionKey>) -> Result<Vec<&CollectionDescriptor>> {
        match key {
            Some(key) => Ok(vec![self.locate(key)?]),
            None => Ok(self.collections.iter().collect()),
        }
    }

    /// Returns every collection of the scope.
    pub fn collections(&self) -> &[CollectionDescriptor] {
        &self.collections
    }

    /// Returns the ring.
    pub fn ring(&self) -> &Arc<HashRing> {
        &self.ring
    }

    fn locate(&self, key: &PartitionKey) -> Result<&CollectionDescriptor> {
        let owner = self.ring.lookup_key(key);
        self.collections
            .iter()
            .find(|c| c.id == owner)
            .ok_or_else(|| {
                RoutingError::UnknownOwner {
                    key: key.to_string(),
                    owner: owner.to_string(),
                }
                .into()
            })
    }
}

impl fmt::Debug for PartitionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionResolver")
            .field("collections", &self.collections)
            .field("vnodes", &self.ring.len())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}
