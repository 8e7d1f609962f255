//! Tweet status documents used by the import pipeline and the demo.
//!
//! Statuses are partitioned by the id of the user who posted them, so all of
//! a user's statuses live in the same physical collection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::client::Document;
use crate::error::{Error, Result};
use crate::partition::{KeyExtractor, PartitionKey};

/// A single tweet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TweeterStatus {
    pub status_id: i64,
    pub text: String,
    pub user: User,
    /// Creation time as Unix seconds.
    pub created_at: i64,
    #[serde(default)]
    pub retweet_count: u32,
    #[serde(default)]
    pub favorite_count: u32,
    #[serde(default)]
    pub entities: Entities,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_status_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub name: String,
    pub screen_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub hashtags: Vec<HashTag>,
    #[serde(default)]
    pub user_mentions: Vec<UserMention>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashTag {
    pub text: String,
    #[serde(default)]
    pub indices: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMention {
    pub user_id: i64,
    pub name: String,
    pub screen_name: String,
    #[serde(default)]
    pub indices: Vec<u32>,
}

impl TweeterStatus {
    /// Converts the status into a store document whose `id` is the status id.
    pub fn to_document(&self) -> Result<Document> {
        let mut document =
            serde_json::to_value(self).map_err(|e| Error::InvalidInput(e.to_string()))?;
        if let Some(object) = document.as_object_mut() {
            object.insert("id".to_string(), self.status_id.to_string().into());
        }
        Ok(document)
    }

    /// Reads a status back from a store document.
    pub fn from_document(document: &Document) -> Result<Self> {
        serde_json::from_value(document.clone()).map_err(|e| Error::InvalidInput(e.to_string()))
    }
}

/// Extractor partitioning status documents by `user.user_id`.
pub fn user_partition_key() -> KeyExtractor {
    Arc::new(|document: &Document| {
        document
            .get("user")?
            .get("user_id")?
            .as_i64()
            .map(PartitionKey::Int)
    })
}
