//! Partition keys and the byte form hashed onto the ring.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Value that decides which physical collection owns a logical entity.
///
/// A key must be stable for an entity across its whole lifetime; if it
/// changes, later reads and writes for that entity land on another collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartitionKey {
    /// String key, hashed as its UTF-8 bytes.
    Str(String),
    /// Integer key, hashed as its decimal representation.
    Int(i64),
}

impl PartitionKey {
    /// Returns the bytes hashed onto the ring.
    ///
    /// Integers hash as their decimal text so that `Int(42)` and `Str("42")`
    /// are routed to the same collection.
    pub fn as_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            PartitionKey::Str(s) => Cow::Borrowed(s.as_bytes()),
            PartitionKey::Int(n) => Cow::Owned(n.to_string().into_bytes()),
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionKey::Str(s) => f.write_str(s),
            PartitionKey::Int(n) => write!(f, "{}", n),
        }
    }
}

impl From<String> for PartitionKey {
    fn from(value: String) -> Self {
        PartitionKey::Str(value)
    }
}

impl From<&str> for PartitionKey {
    fn from(value: &str) -> Self {
        PartitionKey::Str(value.to_string())
    }
}

impl From<i64> for PartitionKey {
    fn from(value: i64) -> Self {
        PartitionKey::Int(value)
    }
}
