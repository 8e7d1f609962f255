pub mod client;
pub mod config;
pub mod error;
pub mod import;
pub mod models;
pub mod partition;
pub mod registry;
pub mod retry;
pub mod session;
pub mod telemetry;

// Re-export common types for convenience
pub use client::{Document, DocumentClient, RemoteError};
pub use config::Config;
pub use error::{Error, Result};
pub use partition::{HashRing, PartitionConfig, PartitionKey, PartitionResolver};
pub use registry::{CollectionDescriptor, CollectionRegistry};
pub use retry::{RetryError, RetryExecutor, RetryPolicy};
pub use session::{CollectionSize, PartitionedSession};
