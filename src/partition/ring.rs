//! Consistent hash ring mapping partition keys to physical collections.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::partition::config::PartitionConfig;
use crate::partition::hash::{encode_vnode, HashGenerator};
use crate::partition::key::PartitionKey;

/// One position on the ring owned by a physical collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualNode {
    /// Ring position.
    pub hash: u64,
    /// Id of the owning collection.
    pub owner: String,
}

/// Immutable consistent hash ring.
///
/// Every collection contributes `virtual_nodes_per_collection` positions,
/// each derived from `hash([id_len][id][replica])`. Nodes are kept sorted by
/// `(hash, owner)` so identical inputs always yield an identical ring.
///
/// The ring is never modified after [`HashRing::build`]; a membership change
/// means building a new ring. Lookups take `&self` and can run from any
/// number of tasks at once.
#[derive(Debug, Clone)]
pub struct HashRing {
    nodes: Vec<VirtualNode>,
    owners: Vec<String>,
    virtual_nodes_per_collection: u32,
    hasher: Arc<dyn HashGenerator>,
}

impl HashRing {
    /// Builds a ring from `collection_ids` using the configured hasher.
    pub fn build<I, S>(collection_ids: I, config: &PartitionConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build_with_hasher(
            collection_ids,
            config.virtual_nodes_per_collection,
            Arc::new(config.hasher()),
        )
    }

    /// Builds a ring with an explicit hash generator.
    ///
    /// # Errors
    /// Fails with a configuration error if the collection set is empty, if a
    /// collection id repeats, or if `virtual_nodes_per_collection` is 0.
    pub fn build_with_hasher<I, S>(
        collection_ids: I,
        virtual_nodes_per_collection: u32,
        hasher: Arc<dyn HashGenerator>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if virtual_nodes_per_collection == 0 {
            return Err(ConfigError::InvalidVirtualNodeCount(virtual_nodes_per_collection).into());
        }

        let owners: Vec<String> = collection_ids.into_iter().map(Into::into).collect();
        if owners.is_empty() {
            return Err(ConfigError::EmptyCollectionSet.into());
        }

        let mut seen = HashSet::with_capacity(owners.len());
        for owner in &owners {
            if !seen.insert(owner.as_str()) {
                return Err(ConfigError::DuplicateCollection(owner.clone()).into());
            }
        }

        let mut nodes = Vec::with_capacity(owners.len() * virtual_nodes_per_collection as usize);
        for owner in &owners {
            for replica in 0..virtual_nodes_per_collection {
                nodes.push(VirtualNode {
                    hash: hasher.hash(&encode_vnode(owner, replica)),
                    owner: owner.clone(),
                });
            }
        }

        // Ties on the hash fall back to owner order so the ring is reproducible.
        nodes.sort_unstable_by(|a, b| a.hash.cmp(&b.hash).then_with(|| a.owner.cmp(&b.owner)));

        debug!(
            collections = owners.len(),
            vnodes = nodes.len(),
            hasher = hasher.name(),
            "built hash ring"
        );

        Ok(Self {
            nodes,
            owners,
            virtual_nodes_per_collection,
            hasher,
        })
    }

    /// Returns the collection owning `key`.
    ///
    /// Finds the first virtual node whose hash is >= the key's hash, wrapping
    /// around to the first node when the key hashes past the last one.
    pub fn lookup(&self, key: &[u8]) -> &str {
        let position = self.hasher.hash(key);
        let index = self.nodes.partition_point(|node| node.hash < position);

        // A built ring always holds at least one node.
        let node = self.nodes.get(index).unwrap_or(&self.nodes[0]);
        &node.owner
    }

    /// Returns the collection owning a partition key.
    pub fn lookup_key(&self, key: &PartitionKey) -> &str {
        self.lookup(&key.as_bytes())
    }

    /// Returns the collection ids in the order they were supplied.
    pub fn owners(&self) -> &[String] {
        &self.owners
    }

    /// Returns true if `collection_id` has positions on this ring.
    pub fn contains_owner(&self, collection_id: &str) -> bool {
        self.owners.iter().any(|owner| owner == collection_id)
    }

    /// Returns the sorted virtual nodes.
    pub fn nodes(&self) -> &[VirtualNode] {
        &self.nodes
    }

    /// Returns the total number of virtual nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false for a built ring; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the number of virtual nodes per collection.
    pub fn virtual_nodes_per_collection(&self) -> u32 {
        self.virtual_nodes_per_collection
    }
}
