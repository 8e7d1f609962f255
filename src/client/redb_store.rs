//! Local document store backed by redb.
//!
//! Each collection maps to its own redb table named after the collection
//! link, keyed by document id and holding the JSON bytes of the document.
//! Two catalog tables record which databases and collections exist, so the
//! store answers `NotFound` and `Conflict` exactly like a remote service.
//!
//! redb is synchronous; every call runs on the blocking thread pool so the
//! async caller is never stalled by disk I/O.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, TableError};
use tracing::debug;

use super::{
    document_id, CollectionLink, CollectionMetadata, DatabaseLink, DatabaseMetadata, Document,
    DocumentClient, RemoteError, RemoteResult, Response,
};

const DATABASES: TableDefinition<&str, &[u8]> = TableDefinition::new("catalog/databases");
const COLLECTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("catalog/collections");

const READ_CHARGE: f64 = 1.0;
const WRITE_BASE_CHARGE: f64 = 5.0;

type StoreResult<T> = std::result::Result<T, RemoteError>;

/// [`DocumentClient`] that keeps everything in a redb database.
#[derive(Clone)]
pub struct RedbDocumentClient {
    db: Arc<Database>,
}

impl RedbDocumentClient {
    /// Opens (or creates) a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path.as_ref()).map_err(RemoteError::internal)?;
        debug!(path = %path.as_ref().display(), "opened redb document store");
        Ok(Self::from_database(db))
    }

    /// Creates a store that lives only in memory.
    pub fn in_memory() -> StoreResult<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(RemoteError::internal)?;
        Ok(Self::from_database(db))
    }

    /// Wraps an already opened database.
    pub fn from_database(db: Database) -> Self {
        Self { db: Arc::new(db) }
    }

    async fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(RemoteError::internal)?
    }
}

fn documents_table(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}

fn documents_table_name(collection: &CollectionLink) -> String {
    format!("docs/{}", collection)
}

fn write_charge(bytes: usize) -> f64 {
    WRITE_BASE_CHARGE + bytes as f64 / 1024.0
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(RemoteError::internal)
}

/// Looks up a catalog entry, returning `None` when the catalog table does not exist yet.
fn read_catalog<T: serde::de::DeserializeOwned>(
    db: &Database,
    table: TableDefinition<'static, &'static str, &'static [u8]>,
    key: &str,
) -> StoreResult<Option<T>> {
    let txn = db.begin_read().map_err(RemoteError::internal)?;
    let catalog = match txn.open_table(table) {
        Ok(catalog) => catalog,
        Err(TableError::TableDoesNotExist(_)) => return Ok(None),
        Err(err) => return Err(RemoteError::internal(err)),
    };

    match catalog.get(key).map_err(RemoteError::internal)? {
        Some(guard) => decode(guard.value()).map(Some),
        None => Ok(None),
    }
}

fn require_collection(db: &Database, collection: &CollectionLink) -> StoreResult<CollectionMetadata> {
    read_catalog(db, COLLECTIONS, collection.as_str())?
        .ok_or_else(|| RemoteError::NotFound(collection.to_string()))
}

#[async_trait::async_trait]
impl DocumentClient for RedbDocumentClient {
    async fn create_database(&self, id: &str) -> RemoteResult<DatabaseMetadata> {
        let metadata = DatabaseMetadata {
            id: id.to_string(),
            link: DatabaseLink::new(id),
        };

        self.run(move |db| {
            let bytes = serde_json::to_vec(&metadata).map_err(RemoteError::internal)?;
            let txn = db.begin_write().map_err(RemoteError::internal)?;
            {
                let mut catalog = txn.open_table(DATABASES).map_err(RemoteError::internal)?;
                if catalog
                    .get(metadata.link.as_str())
                    .map_err(RemoteError::internal)?
                    .is_some()
                {
                    return Err(RemoteError::Conflict(metadata.link.to_string()));
                }
                catalog
                    .insert(metadata.link.as_str(), bytes.as_slice())
                    .map_err(RemoteError::internal)?;
            }
            txn.commit().map_err(RemoteError::internal)?;

            debug!(database = %metadata.link, "created database");
            Ok(Response::new(metadata, write_charge(bytes.len())))
        })
        .await
    }

    async fn read_database(&self, id: &str) -> RemoteResult<DatabaseMetadata> {
        let link = DatabaseLink::new(id);
        self.run(move |db| {
            read_catalog(db, DATABASES, link.as_str())?
                .map(|metadata| Response::new(metadata, READ_CHARGE))
                .ok_or_else(|| RemoteError::NotFound(link.to_string()))
        })
        .await
    }

    async fn create_collection(
        &self,
        database: &DatabaseLink,
        id: &str,
    ) -> RemoteResult<CollectionMetadata> {
        let database = database.clone();
        let metadata = CollectionMetadata {
            id: id.to_string(),
            link: database.collection(id),
        };

        self.run(move |db| {
            if read_catalog::<DatabaseMetadata>(db, DATABASES, database.as_str())?.is_none() {
                return Err(RemoteError::NotFound(database.to_string()));
            }

            let bytes = serde_json::to_vec(&metadata).map_err(RemoteError::internal)?;
            let table_name = documents_table_name(&metadata.link);
            let txn = db.begin_write().map_err(RemoteError::internal)?;
            {
                let mut catalog = txn.open_table(COLLECTIONS).map_err(RemoteError::internal)?;
                if catalog
                    .get(metadata.link.as_str())
                    .map_err(RemoteError::internal)?
                    .is_some()
                {
                    return Err(RemoteError::Conflict(metadata.link.to_string()));
                }
                catalog
                    .insert(metadata.link.as_str(), bytes.as_slice())
                    .map_err(RemoteError::internal)?;

                // Opening the table inside the write transaction creates it.
                txn.open_table(documents_table(&table_name))
                    .map_err(RemoteError::internal)?;
            }
            txn.commit().map_err(RemoteError::internal)?;

            debug!(collection = %metadata.link, "created collection");
            Ok(Response::new(metadata, write_charge(bytes.len())))
        })
        .await
    }

    async fn read_collection(&self, collection: &CollectionLink) -> RemoteResult<CollectionMetadata> {
        let collection = collection.clone();
        self.run(move |db| {
            require_collection(db, &collection).map(|metadata| Response::new(metadata, READ_CHARGE))
        })
        .await
    }

    async fn create_document(
        &self,
        collection: &CollectionLink,
        document: Document,
    ) -> RemoteResult<Document> {
        let id = document_id(&document)?.to_string();
        let collection = collection.clone();

        self.run(move |db| {
            require_collection(db, &collection)?;

            let bytes = serde_json::to_vec(&document).map_err(RemoteError::internal)?;
            let table_name = documents_table_name(&collection);
            let txn = db.begin_write().map_err(RemoteError::internal)?;
            {
                let mut table = txn
                    .open_table(documents_table(&table_name))
                    .map_err(RemoteError::internal)?;
                if table.get(id.as_str()).map_err(RemoteError::internal)?.is_some() {
                    return Err(RemoteError::Conflict(format!("{}/docs/{}", collection, id)));
                }
                table
                    .insert(id.as_str(), bytes.as_slice())
                    .map_err(RemoteError::internal)?;
            }
            txn.commit().map_err(RemoteError::internal)?;

            Ok(Response::new(document, write_charge(bytes.len())))
        })
        .await
    }

    async fn read_document(&self, collection: &CollectionLink, id: &str) -> RemoteResult<Document> {
        let collection = collection.clone();
        let id = id.to_string();

        self.run(move |db| {
            require_collection(db, &collection)?;

            let table_name = documents_table_name(&collection);
            let txn = db.begin_read().map_err(RemoteError::internal)?;
            let table = txn
                .open_table(documents_table(&table_name))
                .map_err(RemoteError::internal)?;

            match table.get(id.as_str()).map_err(RemoteError::internal)? {
                Some(guard) => Ok(Response::new(decode(guard.value())?, READ_CHARGE)),
                None => Err(RemoteError::NotFound(format!("{}/docs/{}", collection, id))),
            }
        })
        .await
    }

    async fn read_document_feed(
        &self,
        collection: &CollectionLink,
        max_items: usize,
    ) -> RemoteResult<Vec<Document>> {
        let collection = collection.clone();

        self.run(move |db| {
            require_collection(db, &collection)?;

            let table_name = documents_table_name(&collection);
            let txn = db.begin_read().map_err(RemoteError::internal)?;
            let table = txn
                .open_table(documents_table(&table_name))
                .map_err(RemoteError::internal)?;

            let mut documents = Vec::new();
            for entry in table.iter().map_err(RemoteError::internal)?.take(max_items) {
                let (_, value) = entry.map_err(RemoteError::internal)?;
                documents.push(decode(value.value())?);
            }

            let charge = READ_CHARGE + documents.len() as f64 * 0.1;
            Ok(Response::new(documents, charge))
        })
        .await
    }

    async fn delete_document(&self, collection: &CollectionLink, id: &str) -> RemoteResult<()> {
        let collection = collection.clone();
        let id = id.to_string();

        self.run(move |db| {
            require_collection(db, &collection)?;

            let table_name = documents_table_name(&collection);
            let txn = db.begin_write().map_err(RemoteError::internal)?;
            {
                let mut table = txn
                    .open_table(documents_table(&table_name))
                    .map_err(RemoteError::internal)?;
                if table
                    .remove(id.as_str())
                    .map_err(RemoteError::internal)?
                    .is_none()
                {
                    return Err(RemoteError::NotFound(format!("{}/docs/{}", collection, id)));
                }
            }
            txn.commit().map_err(RemoteError::internal)?;

            Ok(Response::new((), WRITE_BASE_CHARGE))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::NamedTempFile;

    async fn store_with_collection() -> (RedbDocumentClient, CollectionLink) {
        let client = RedbDocumentClient::in_memory().unwrap();
        let db = client.create_database("tweets").await.unwrap().resource;
        let coll = client
            .create_collection(&db.link, "bucket0")
            .await
            .unwrap()
            .resource;
        (client, coll.link)
    }

    #[tokio::test]
    async fn database_lifecycle() {
        let client = RedbDocumentClient::in_memory().unwrap();

        let missing = client.read_database("tweets").await;
        assert!(matches!(missing, Err(RemoteError::NotFound(_))));

        let created = client.create_database("tweets").await.unwrap();
        assert_eq!(created.resource.link.as_str(), "dbs/tweets");
        assert!(created.request_charge > 0.0);

        let read = client.read_database("tweets").await.unwrap();
        assert_eq!(read.resource, created.resource);

        let again = client.create_database("tweets").await;
        assert!(matches!(again, Err(RemoteError::Conflict(_))));
    }

    #[tokio::test]
    async fn collection_requires_database() {
        let client = RedbDocumentClient::in_memory().unwrap();
        let result = client
            .create_collection(&DatabaseLink::new("missing"), "bucket0")
            .await;
        assert!(matches!(result, Err(RemoteError::NotFound(_))));
    }

    #[tokio::test]
    async fn document_create_read_delete() {
        let (client, coll) = store_with_collection().await;

        let doc = json!({"id": "1", "text": "hello"});
        client.create_document(&coll, doc.clone()).await.unwrap();

        let dup = client.create_document(&coll, doc.clone()).await;
        assert!(matches!(dup, Err(RemoteError::Conflict(_))));

        let read = client.read_document(&coll, "1").await.unwrap();
        assert_eq!(read.resource, doc);

        client.delete_document(&coll, "1").await.unwrap();
        let gone = client.read_document(&coll, "1").await;
        assert!(matches!(gone, Err(RemoteError::NotFound(_))));

        let gone_again = client.delete_document(&coll, "1").await;
        assert!(matches!(gone_again, Err(RemoteError::NotFound(_))));
    }

    #[tokio::test]
    async fn document_without_id_is_bad_request() {
        let (client, coll) = store_with_collection().await;
        let result = client.create_document(&coll, json!({"text": "anon"})).await;
        assert!(matches!(result, Err(RemoteError::BadRequest(_))));
    }

    #[tokio::test]
    async fn feed_is_bounded() {
        let (client, coll) = store_with_collection().await;
        for i in 0..5 {
            client
                .create_document(&coll, json!({"id": format!("doc-{i}")}))
                .await
                .unwrap();
        }

        let all = client.read_document_feed(&coll, 1000).await.unwrap();
        assert_eq!(all.resource.len(), 5);

        let some = client.read_document_feed(&coll, 2).await.unwrap();
        assert_eq!(some.resource.len(), 2);
        assert_eq!(some.resource[0]["id"], "doc-0");
    }

    #[tokio::test]
    async fn unknown_collection_is_not_found() {
        let (client, _) = store_with_collection().await;
        let other = CollectionLink::new("tweets", "bucket9");
        assert!(matches!(
            client.read_collection(&other).await,
            Err(RemoteError::NotFound(_))
        ));
        assert!(matches!(
            client.read_document_feed(&other, 10).await,
            Err(RemoteError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let temp_file = NamedTempFile::new().unwrap();
        {
            let client = RedbDocumentClient::open(temp_file.path()).unwrap();
            let db = client.create_database("tweets").await.unwrap().resource;
            let coll = client.create_collection(&db.link, "b0").await.unwrap().resource;
            client
                .create_document(&coll.link, json!({"id": "kept"}))
                .await
                .unwrap();
        }

        let client = RedbDocumentClient::open(temp_file.path()).unwrap();
        let doc = client
            .read_document(&CollectionLink::new("tweets", "b0"), "kept")
            .await
            .unwrap();
        assert_eq!(doc.resource["id"], "kept");
    }
}
