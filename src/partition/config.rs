//! Configuration for hash partitioning.

use crate::error::{ConfigError, Result};
use crate::partition::hash::Xxh3Hasher;

/// Virtual nodes per collection used when nothing else is configured.
pub const DEFAULT_VIRTUAL_NODES: u32 = 128;

/// Configuration for a hash-partitioned scope.
///
/// Controls how evenly keys spread across physical collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionConfig {
    /// Number of ring positions assigned to every physical collection.
    ///
    /// Higher values smooth the distribution at the cost of a larger ring.
    /// Must be greater than 0.
    pub virtual_nodes_per_collection: u32,

    /// Optional seed mixed into every ring hash.
    ///
    /// Rings only agree on routing when they share the seed, so changing it
    /// reshuffles every key.
    pub hash_seed: Option<u64>,
}

impl PartitionConfig {
    /// Creates a validated configuration.
    ///
    /// # Arguments
    /// * `virtual_nodes_per_collection` - Ring positions per collection (> 0)
    /// * `hash_seed` - Optional hash seed
    pub fn new(virtual_nodes_per_collection: u32, hash_seed: Option<u64>) -> Result<Self> {
        if virtual_nodes_per_collection == 0 {
            return Err(ConfigError::InvalidVirtualNodeCount(virtual_nodes_per_collection).into());
        }

        Ok(Self {
            virtual_nodes_per_collection,
            hash_seed,
        })
    }

    /// Returns the hash generator described by this configuration.
    pub fn hasher(&self) -> Xxh3Hasher {
        match self.hash_seed {
            Some(seed) => Xxh3Hasher::with_seed(seed),
            None => Xxh3Hasher::new(),
        }
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            virtual_nodes_per_collection: DEFAULT_VIRTUAL_NODES,
            hash_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::hash::HashGenerator;

    #[test]
    fn test_valid_config() {
        let config = PartitionConfig::new(64, Some(9)).unwrap();
        assert_eq!(config.virtual_nodes_per_collection, 64);
        assert_eq!(config.hash_seed, Some(9));
    }

    #[test]
    fn test_invalid_virtual_node_count() {
        let config = PartitionConfig::new(0, None);
        assert!(config.is_err());
    }

    #[test]
    fn test_default_config() {
        let config = PartitionConfig::default();
        assert_eq!(config.virtual_nodes_per_collection, 128);
        assert!(config.hash_seed.is_none());
    }

    #[test]
    fn test_hasher_honours_seed() {
        let seeded = PartitionConfig::new(8, Some(1)).unwrap().hasher();
        assert_eq!(seeded.hash(b"k"), Xxh3Hasher::with_seed(1).hash(b"k"));
    }
}
