//! File-based configuration.
//!
//! ```toml
//! [store]
//! path = "tweets.redb"
//!
//! [partitioning]
//! database_id = "tweets"
//! collection_ids = ["bucket0", "bucket1"]
//! virtual_nodes = 128
//!
//! [retry]
//! max_attempts = 10
//! max_total_wait_ms = 30000
//!
//! [throttle]
//! request_units_per_sec = 400.0
//! burst = 400.0
//!
//! [log]
//! level = "info"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::ThrottleConfig;
use crate::error::{ConfigError, Result};
use crate::partition::{PartitionConfig, DEFAULT_VIRTUAL_NODES};
use crate::retry::RetryPolicy;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub partitioning: PartitioningConfig,
    pub retry: RetrySettings,
    pub throttle: Option<ThrottleSettings>,
    pub log: LogConfig,
}

/// Where documents are stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// redb file. `None` keeps the store in memory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitioningConfig {
    pub database_id: String,
    pub collection_ids: Vec<String>,
    pub virtual_nodes: u32,
    pub hash_seed: Option<u64>,
}

impl Default for PartitioningConfig {
    fn default() -> Self {
        Self {
            database_id: "tweets".to_string(),
            collection_ids: vec!["bucket0".to_string(), "bucket1".to_string()],
            virtual_nodes: DEFAULT_VIRTUAL_NODES,
            hash_seed: None,
        }
    }
}

/// Retry ceilings. Both absent means retry throttled calls forever.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: Option<u32>,
    pub max_total_wait_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrottleSettings {
    pub request_units_per_sec: f64,
    pub burst: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Parses and validates a TOML document.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml(&text)
    }

    /// Rejects settings that would make the ring or the throttle unusable.
    pub fn validate(&self) -> Result<()> {
        let partitioning = &self.partitioning;
        if partitioning.collection_ids.is_empty() {
            return Err(ConfigError::EmptyCollectionSet.into());
        }
        if partitioning.virtual_nodes == 0 {
            return Err(ConfigError::InvalidVirtualNodeCount(0).into());
        }

        let mut seen = HashSet::new();
        for id in &partitioning.collection_ids {
            if !seen.insert(id.as_str()) {
                return Err(ConfigError::DuplicateCollection(id.clone()).into());
            }
        }

        self.throttle_config()?;
        Ok(())
    }

    pub fn partition_config(&self) -> Result<PartitionConfig> {
        PartitionConfig::new(self.partitioning.virtual_nodes, self.partitioning.hash_seed)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::unbounded();
        if let Some(attempts) = self.retry.max_attempts {
            policy = policy.with_max_attempts(attempts);
        }
        if let Some(ms) = self.retry.max_total_wait_ms {
            policy = policy.with_max_total_wait(Duration::from_millis(ms));
        }
        policy
    }

    /// Returns the throttle settings, if throttling is enabled.
    pub fn throttle_config(&self) -> Result<Option<ThrottleConfig>> {
        self.throttle
            .as_ref()
            .map(|t| ThrottleConfig::new(t.request_units_per_sec, t.burst))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.partitioning.virtual_nodes, 128);
        assert_eq!(config.log.level, "info");
        assert!(config.throttle_config().unwrap().is_none());
        assert_eq!(config.retry_policy(), RetryPolicy::unbounded());
    }

    #[test]
    fn full_document() {
        let config = Config::from_toml(
            r#"
            [store]
            path = "data/tweets.redb"

            [partitioning]
            database_id = "feeds"
            collection_ids = ["a", "b", "c"]
            virtual_nodes = 64
            hash_seed = 7

            [retry]
            max_attempts = 5
            max_total_wait_ms = 2000

            [throttle]
            request_units_per_sec = 50.0
            burst = 10.0

            [log]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.path, Some(PathBuf::from("data/tweets.redb")));
        assert_eq!(config.partitioning.collection_ids.len(), 3);

        let partition = config.partition_config().unwrap();
        assert_eq!(partition.virtual_nodes_per_collection, 64);
        assert_eq!(partition.hash_seed, Some(7));

        assert_eq!(
            config.retry_policy(),
            RetryPolicy::unbounded()
                .with_max_attempts(5)
                .with_max_total_wait(Duration::from_millis(2000))
        );
        assert!(config.throttle_config().unwrap().is_some());
    }

    #[test]
    fn rejects_empty_collection_set() {
        let result = Config::from_toml("[partitioning]\ncollection_ids = []\n");
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::EmptyCollectionSet))
        ));
    }

    #[test]
    fn rejects_zero_virtual_nodes() {
        let result = Config::from_toml("[partitioning]\nvirtual_nodes = 0\n");
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidVirtualNodeCount(0)))
        ));
    }

    #[test]
    fn rejects_duplicate_collections() {
        let result = Config::from_toml("[partitioning]\ncollection_ids = [\"a\", \"a\"]\n");
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::DuplicateCollection(id))) if id == "a"
        ));
    }

    #[test]
    fn rejects_non_positive_throttle() {
        let result =
            Config::from_toml("[throttle]\nrequest_units_per_sec = 0.0\nburst = 1.0\n");
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidThrottle(_)))
        ));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let result = Config::from_toml("[partitioning\n");
        assert!(matches!(result, Err(Error::Config(ConfigError::Parse(_)))));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docstore.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[partitioning]\ndatabase_id = \"from-file\"").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.partitioning.database_id, "from-file");

        let missing = Config::load(dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(Error::Config(ConfigError::Io(_)))));
    }
}
