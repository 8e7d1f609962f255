//! Crate-scoped error handling for docstore-partition.
//!
//! Each layer keeps its own precise error type; [`Error`] wraps them so that
//! callers of the session API deal with a single enum while still being able
//! to match on the exact failure kind.

use crate::client::RemoteError;
use crate::retry::RetryError;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type exposed to users of the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The remote store rejected the request. The original kind is preserved.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Ring, registry or configuration built from an empty or inconsistent
    /// collection set. Raised at construction time.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A key or scope could not be mapped to a registered collection.
    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    /// The retry executor gave up before the backend admitted the request.
    #[error("retry error: {0}")]
    Retry(#[from] RetryError),

    /// Invalid input parameters
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Returns the remote error carried by this error, if any.
    pub fn as_remote(&self) -> Option<&RemoteError> {
        match self {
            Error::Remote(err) => Some(err),
            Error::Retry(RetryError::Exhausted { last, .. }) => Some(last),
            _ => None,
        }
    }

    /// Returns true when the remote store reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Remote(RemoteError::NotFound(_)))
    }
}

/// Errors raised while building rings, registries or loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A ring or scope needs at least one physical collection.
    #[error("collection set is empty")]
    EmptyCollectionSet,

    /// Every collection needs at least one virtual node on the ring.
    #[error("invalid virtual node count {0}: must be greater than 0")]
    InvalidVirtualNodeCount(u32),

    /// The same collection id was supplied twice.
    #[error("duplicate collection id: {0}")]
    DuplicateCollection(String),

    /// The scope already has a ring bound to it.
    #[error("scope already registered: {0}")]
    ScopeAlreadyRegistered(String),

    /// Ring owners and registered collections disagree.
    #[error("ring and collection set disagree on collection {0}")]
    InconsistentRing(String),

    /// Throttle parameters must be positive.
    #[error("invalid throttle settings: {0}")]
    InvalidThrottle(String),

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised when a key or scope cannot be routed.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// The ring resolved to a collection that is not registered (stale ring).
    #[error("key {key} resolved to unknown collection {owner}")]
    UnknownOwner {
        /// Display form of the partition key.
        key: String,
        /// Owner id returned by the ring.
        owner: String,
    },

    /// No ring has been registered for the scope.
    #[error("no partitioning registered for scope {0}")]
    UnknownScope(String),

    /// The key extractor produced no key for the document.
    #[error("document has no partition key")]
    MissingPartitionKey,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn remote_kind_survives_conversion() {
        let err: Error = RemoteError::NotFound("dbs/tweets".to_string()).into();
        assert!(err.is_not_found());
        assert_eq!(err.as_remote().map(RemoteError::status), Some(404));
    }

    #[test]
    fn exhausted_retry_exposes_last_remote_error() {
        let err: Error = RetryError::Exhausted {
            attempts: 3,
            waited: Duration::from_millis(30),
            last: RemoteError::throttled("busy", Some(Duration::from_millis(10))),
        }
        .into();

        assert!(!err.is_not_found());
        assert_eq!(err.as_remote().map(RemoteError::status), Some(429));
    }

    #[test]
    fn display_names_the_layer() {
        let err: Error = ConfigError::EmptyCollectionSet.into();
        assert_eq!(err.to_string(), "configuration error: collection set is empty");

        let err: Error = RoutingError::UnknownScope("dbs/x".to_string()).into();
        assert_eq!(
            err.to_string(),
            "routing error: no partitioning registered for scope dbs/x"
        );
    }
}
