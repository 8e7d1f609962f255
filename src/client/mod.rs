//! Document store client interface.
//!
//! The partitioning layer talks to the store only through [`DocumentClient`].
//! Two implementations ship with the crate: [`RedbDocumentClient`], a local
//! store on top of redb, and [`ThrottledClient`], a wrapper that rate-limits
//! any other client the way a provisioned remote store does.

pub mod error;
pub mod redb_store;
pub mod throttled;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use redb_store::RedbDocumentClient;
pub use error::RemoteError;
pub use throttled::{ThrottleConfig, ThrottledClient};

/// A JSON document. Objects carry their identity in a string `id` field.
pub type Document = serde_json::Value;

/// Result of a single store call.
pub type RemoteResult<T> = std::result::Result<Response<T>, RemoteError>;

/// Opaque locator of a database, `dbs/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatabaseLink(String);

impl DatabaseLink {
    /// Builds the link for database `id`.
    pub fn new(id: &str) -> Self {
        Self(format!("dbs/{}", id))
    }

    /// Returns the link text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds the link of a collection inside this database.
    pub fn collection(&self, collection_id: &str) -> CollectionLink {
        CollectionLink(format!("{}/colls/{}", self.0, collection_id))
    }
}

impl fmt::Display for DatabaseLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque locator of a collection, `dbs/{db}/colls/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionLink(String);

impl CollectionLink {
    /// Builds the link for collection `collection_id` in database `database_id`.
    pub fn new(database_id: &str, collection_id: &str) -> Self {
        DatabaseLink::new(database_id).collection(collection_id)
    }

    /// Returns the link text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the link of the enclosing database.
    pub fn database(&self) -> DatabaseLink {
        match self.0.find("/colls/") {
            Some(idx) => DatabaseLink(self.0[..idx].to_string()),
            None => DatabaseLink(self.0.clone()),
        }
    }
}

impl fmt::Display for CollectionLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata of a database resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    /// Database id.
    pub id: String,
    /// Locator used by later calls.
    pub link: DatabaseLink,
}

/// Metadata of a collection resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    /// Collection id.
    pub id: String,
    /// Locator used by later calls.
    pub link: CollectionLink,
}

/// Successful store response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    /// The returned resource.
    pub resource: T,
    /// Capacity consumed by the request, as reported by the store.
    ///
    /// Informational only; routing and retries never look at it.
    pub request_charge: f64,
}

impl<T> Response<T> {
    /// Wraps a resource with its request charge.
    pub fn new(resource: T, request_charge: f64) -> Self {
        Self {
            resource,
            request_charge,
        }
    }

    /// Consumes the response, returning the resource.
    pub fn into_resource(self) -> T {
        self.resource
    }
}

/// Operations the partitioning layer needs from a document store.
///
/// All implementations must be `Send + Sync` so they can be shared across
/// async tasks behind an `Arc`.
#[async_trait::async_trait]
pub trait DocumentClient: Send + Sync {
    /// Creates a database. Fails with `Conflict` if it exists.
    async fn create_database(&self, id: &str) -> RemoteResult<DatabaseMetadata>;

    /// Reads a database. Fails with `NotFound` if it does not exist.
    async fn read_database(&self, id: &str) -> RemoteResult<DatabaseMetadata>;

    /// Creates a collection. Fails with `Conflict` if it exists.
    async fn create_collection(
        &self,
        database: &DatabaseLink,
        id: &str,
    ) -> RemoteResult<CollectionMetadata>;

    /// Reads a collection's metadata.
    async fn read_collection(&self, collection: &CollectionLink) -> RemoteResult<CollectionMetadata>;

    /// Stores a new document. Fails with `Conflict` if its id is taken.
    async fn create_document(
        &self,
        collection: &CollectionLink,
        document: Document,
    ) -> RemoteResult<Document>;

    /// Reads a document by id.
    async fn read_document(&self, collection: &CollectionLink, id: &str) -> RemoteResult<Document>;

    /// Reads up to `max_items` documents from a collection in id order.
    async fn read_document_feed(
        &self,
        collection: &CollectionLink,
        max_items: usize,
    ) -> RemoteResult<Vec<Document>>;

    /// Deletes a document by id.
    async fn delete_document(&self, collection: &CollectionLink, id: &str) -> RemoteResult<()>;
}

/// Returns the `id` of a document, or `BadRequest` if it has none.
pub fn document_id(document: &Document) -> std::result::Result<&str, RemoteError> {
    document
        .get("id")
        .and_then(|id| id.as_str())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| RemoteError::BadRequest("document has no string id".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn links_nest() {
        let db = DatabaseLink::new("tweets");
        let coll = db.collection("bucket0");
        assert_eq!(db.as_str(), "dbs/tweets");
        assert_eq!(coll.as_str(), "dbs/tweets/colls/bucket0");
        assert_eq!(coll.database(), db);
        assert_eq!(CollectionLink::new("tweets", "bucket0"), coll);
    }

    #[test]
    fn document_id_requires_string() {
        assert_eq!(document_id(&json!({"id": "a"})).unwrap(), "a");
        assert!(document_id(&json!({"id": 5})).is_err());
        assert!(document_id(&json!({"id": ""})).is_err());
        assert!(document_id(&json!({"text": "no id"})).is_err());
    }
}
