//! Client-side hash partitioning.
//!
//! This module maps documents onto a fixed set of physical collections using
//! a consistent hash ring with virtual nodes. It knows nothing about the store
//! itself: the output of every operation is a collection descriptor that the
//! caller then addresses through a [`DocumentClient`](crate::client::DocumentClient).

pub mod config;
pub mod hash;
pub mod key;
pub mod resolver;
pub mod ring;

// Re-export main types for public API
pub use config::{PartitionConfig, DEFAULT_VIRTUAL_NODES};
pub use hash::{HashGenerator, Xxh3Hasher};
pub use key::PartitionKey;
pub use resolver::{
    field_extractor, KeyExtractor, PartitionResolver, RouteObserver, TracingRouteObserver,
};
pub use ring::{HashRing, VirtualNode};
