//! Partitioned session: the caller-owned context for all store calls.
//!
//! A session owns the document client, the retry executor, the collection
//! registry and one resolver per registered scope. Scopes are registered
//! while the session is being set up (`&mut self`); afterwards every
//! operation takes `&self`, so the session can be shared behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::client::{
    CollectionMetadata, DatabaseLink, DatabaseMetadata, Document, DocumentClient, RemoteError,
    Response,
};
use crate::error::{ConfigError, Error, Result, RoutingError};
use crate::partition::{
    HashRing, KeyExtractor, PartitionConfig, PartitionKey, PartitionResolver, RouteObserver,
    TracingRouteObserver,
};
use crate::registry::{CollectionDescriptor, CollectionRegistry};
use crate::retry::RetryExecutor;

/// Document count of one physical collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSize {
    /// Collection id.
    pub id: String,
    /// Number of documents stored.
    pub documents: usize,
}

/// Caller-owned context bundling client, retries and partitioning.
pub struct PartitionedSession<C> {
    client: Arc<C>,
    executor: RetryExecutor,
    registry: CollectionRegistry,
    resolvers: HashMap<String, PartitionResolver>,
    observer: Option<Arc<dyn RouteObserver>>,
}

impl<C: DocumentClient + 'static> PartitionedSession<C> {
    /// Creates a session that logs routing decisions through `tracing`.
    pub fn new(client: Arc<C>, executor: RetryExecutor) -> Self {
        Self {
            client,
            executor,
            registry: CollectionRegistry::new(),
            resolvers: HashMap::new(),
            observer: Some(Arc::new(TracingRouteObserver)),
        }
    }

    /// Replaces the routing observer used by scopes registered afterwards.
    pub fn with_route_observer(mut self, observer: Option<Arc<dyn RouteObserver>>) -> Self {
        self.observer = observer;
        self
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Returns the retry executor.
    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    /// Returns the collection registry.
    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    /// Reads a database, creating it if it does not exist.
    pub async fn get_or_create_database(&self, id: &str) -> Result<DatabaseMetadata> {
        match self.executor.execute(|| self.client.read_database(id)).await {
            Ok(response) => return Ok(response.resource),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        match self.executor.execute(|| self.client.create_database(id)).await {
            Ok(response) => {
                info!(database = id, "created database");
                Ok(response.resource)
            }
            // Lost a creation race; the database exists now.
            Err(Error::Remote(RemoteError::Conflict(_))) => self
                .executor
                .execute(|| self.client.read_database(id))
                .await
                .map(Response::into_resource),
            Err(err) => Err(err),
        }
    }

    /// Reads a collection, creating it if it does not exist.
    pub async fn get_or_create_collection(
        &self,
        database: &DatabaseLink,
        id: &str,
    ) -> Result<CollectionMetadata> {
        let link = database.collection(id);
        match self.executor.execute(|| self.client.read_collection(&link)).await {
            Ok(response) => return Ok(response.resource),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        match self
            .executor
            .execute(|| self.client.create_collection(database, id))
            .await
        {
            Ok(response) => {
                info!(collection = %link, "created collection");
                Ok(response.resource)
            }
            Err(Error::Remote(RemoteError::Conflict(_))) => self
                .executor
                .execute(|| self.client.read_collection(&link))
                .await
                .map(Response::into_resource),
            Err(err) => Err(err),
        }
    }

    /// Sets up hash partitioning of `database_id` across `collection_ids`.
    ///
    /// The ring is built before any remote call, so an empty or duplicated
    /// collection set fails without touching the store. Missing database and
    /// collections are created. Returns the scope id used by later calls.
    pub async fn register_hash_scope(
        &mut self,
        database_id: &str,
        collection_ids: &[String],
        config: &PartitionConfig,
        extractor: KeyExtractor,
    ) -> Result<String> {
        let ring = Arc::new(HashRing::build(collection_ids.iter().cloned(), config)?);

        let database = self.get_or_create_database(database_id).await?;
        let scope_id = database.link.to_string();
        if self.registry.contains(&scope_id) {
            return Err(ConfigError::ScopeAlreadyRegistered(scope_id).into());
        }

        let mut descriptors = Vec::with_capacity(collection_ids.len());
        for id in collection_ids {
            let collection = self.get_or_create_collection(&database.link, id).await?;
            descriptors.push(CollectionDescriptor::new(collection.id, collection.link));
        }

        self.registry.register(scope_id.clone(), ring, descriptors)?;

        let mut resolver =
            PartitionResolver::for_scope(self.registry.resolve(&scope_id)?, extractor);
        if let Some(observer) = &self.observer {
            resolver = resolver.with_observer(Arc::clone(observer));
        }
        self.resolvers.insert(scope_id.clone(), resolver);

        info!(
            scope = %scope_id,
            collections = collection_ids.len(),
            vnodes = config.virtual_nodes_per_collection,
            "registered hash partitioned scope"
        );
        Ok(scope_id)
    }

    /// Returns the resolver of a registered scope.
    pub fn resolver(&self, scope_id: &str) -> Result<&PartitionResolver> {
        self.resolvers
            .get(scope_id)
            .ok_or_else(|| RoutingError::UnknownScope(scope_id.to_string()).into())
    }

    /// Writes `document` to the collection owning its partition key.
    pub async fn create_document(
        &self,
        scope_id: &str,
        document: Document,
    ) -> Result<Response<Document>> {
        let resolver = self.resolver(scope_id)?;
        let key = resolver
            .partition_key(&document)
            .ok_or(RoutingError::MissingPartitionKey)?;
        let target = resolver.resolve_for_create(&key)?;

        let response = self
            .executor
            .execute(|| self.client.create_document(&target.link, document.clone()))
            .await?;

        debug!(
            collection = %target.id,
            request_charge = response.request_charge,
            "created document"
        );
        Ok(response)
    }

    /// Reads the document `id` stored under `key`.
    pub async fn read_document(
        &self,
        scope_id: &str,
        key: &PartitionKey,
        id: &str,
    ) -> Result<Document> {
        let target = self.single_target(scope_id, key)?;
        self.executor
            .execute(|| self.client.read_document(&target.link, id))
            .await
            .map(Response::into_resource)
    }

    /// Deletes the document `id` stored under `key`. Returns false if it did not exist.
    pub async fn try_delete_document(
        &self,
        scope_id: &str,
        key: &PartitionKey,
        id: &str,
    ) -> Result<bool> {
        let target = self.single_target(scope_id, key)?;
        match self
            .executor
            .execute(|| self.client.delete_document(&target.link, id))
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Reads up to `max_items` documents from every collection that may hold `key`.
    ///
    /// With a key this reads a single collection. Without one it queries all
    /// collections of the scope concurrently and concatenates the results in
    /// collection order.
    pub async fn read_feed(
        &self,
        scope_id: &str,
        key: Option<&PartitionKey>,
        max_items: usize,
    ) -> Result<Vec<Document>> {
        let targets = self.resolver(scope_id)?.resolve_for_read(key)?;
        let mut pages: Vec<Vec<Document>> = vec![Vec::new(); targets.len()];

        let mut tasks = JoinSet::new();
        for (index, target) in targets.into_iter().enumerate() {
            let client = Arc::clone(&self.client);
            let executor = self.executor.clone();
            let link = target.link.clone();
            tasks.spawn(async move {
                let page = executor
                    .execute(|| client.read_document_feed(&link, max_items))
                    .await;
                (index, page)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, page) = joined.map_err(|e| Error::Remote(RemoteError::internal(e)))?;
            pages[index] = page?.resource;
        }

        Ok(pages.into_iter().flatten().collect())
    }

    /// Counts the documents held by each collection of the scope.
    pub async fn collection_sizes(&self, scope_id: &str) -> Result<Vec<CollectionSize>> {
        let targets = self.resolver(scope_id)?.resolve_for_read(None)?;
        let mut sizes = Vec::with_capacity(targets.len());

        for target in targets {
            let collection = self
                .executor
                .execute(|| self.client.read_collection(&target.link))
                .await?
                .resource;
            let documents = self
                .executor
                .execute(|| self.client.read_document_feed(&target.link, usize::MAX))
                .await?
                .resource
                .len();

            info!(collection = %collection.id, documents, "collection size");
            sizes.push(CollectionSize {
                id: collection.id,
                documents,
            });
        }

        Ok(sizes)
    }

    fn single_target(&self, scope_id: &str, key: &PartitionKey) -> Result<&CollectionDescriptor> {
        let mut targets = self.resolver(scope_id)?.resolve_for_read(Some(key))?;
        targets
            .pop()
            .ok_or_else(|| RoutingError::UnknownScope(scope_id.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RedbDocumentClient;
    use crate::partition::field_extractor;
    use serde_json::json;

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    async fn session() -> (PartitionedSession<RedbDocumentClient>, String) {
        let client = Arc::new(RedbDocumentClient::in_memory().unwrap());
        let mut session = PartitionedSession::new(client, RetryExecutor::default());
        let scope = session
            .register_hash_scope(
                "tweets",
                &ids(&["bucket0", "bucket1"]),
                &PartitionConfig::default(),
                field_extractor("user"),
            )
            .await
            .unwrap();
        (session, scope)
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let client = Arc::new(RedbDocumentClient::in_memory().unwrap());
        let session = PartitionedSession::new(client, RetryExecutor::default());

        let first = session.get_or_create_database("db").await.unwrap();
        let second = session.get_or_create_database("db").await.unwrap();
        assert_eq!(first, second);

        let a = session.get_or_create_collection(&first.link, "c").await.unwrap();
        let b = session.get_or_create_collection(&first.link, "c").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn register_returns_database_scope() {
        let (session, scope) = session().await;
        assert_eq!(scope, "dbs/tweets");
        assert_eq!(session.resolver(&scope).unwrap().collections().len(), 2);
        assert!(session.registry().contains(&scope));
    }

    #[tokio::test]
    async fn empty_collection_set_fails_before_remote_calls() {
        let client = Arc::new(RedbDocumentClient::in_memory().unwrap());
        let mut session = PartitionedSession::new(client.clone(), RetryExecutor::default());

        let result = session
            .register_hash_scope("db", &[], &PartitionConfig::default(), field_extractor("k"))
            .await;
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::EmptyCollectionSet))
        ));
        assert!(matches!(
            client.read_database("db").await,
            Err(RemoteError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn registering_twice_is_rejected() {
        let (mut session, _) = session().await;
        let again = session
            .register_hash_scope(
                "tweets",
                &ids(&["bucket0"]),
                &PartitionConfig::default(),
                field_extractor("user"),
            )
            .await;
        assert!(matches!(
            again,
            Err(Error::Config(ConfigError::ScopeAlreadyRegistered(_)))
        ));
    }

    #[tokio::test]
    async fn create_then_read_by_key() {
        let (session, scope) = session().await;

        session
            .create_document(&scope, json!({"id": "s1", "user": "ann", "text": "hi"}))
            .await
            .unwrap();

        let key = PartitionKey::from("ann");
        let doc = session.read_document(&scope, &key, "s1").await.unwrap();
        assert_eq!(doc["text"], "hi");

        let target = session
            .resolver(&scope)
            .unwrap()
            .resolve_for_create(&key)
            .unwrap()
            .link
            .clone();
        let direct = session.client().read_document(&target, "s1").await.unwrap();
        assert_eq!(direct.resource, doc);
    }

    #[tokio::test]
    async fn document_without_key_is_rejected() {
        let (session, scope) = session().await;
        let result = session.create_document(&scope, json!({"id": "s1"})).await;
        assert!(matches!(
            result,
            Err(Error::Routing(RoutingError::MissingPartitionKey))
        ));
    }

    #[tokio::test]
    async fn unknown_scope_is_rejected() {
        let (session, _) = session().await;
        let result = session
            .create_document("dbs/other", json!({"id": "s1", "user": "ann"}))
            .await;
        assert!(matches!(
            result,
            Err(Error::Routing(RoutingError::UnknownScope(_)))
        ));
    }

    #[tokio::test]
    async fn fan_out_feed_and_sizes() {
        let (session, scope) = session().await;
        for i in 0..20 {
            session
                .create_document(&scope, json!({"id": format!("s{i}"), "user": format!("user-{i}")}))
                .await
                .unwrap();
        }

        let all = session.read_feed(&scope, None, 1000).await.unwrap();
        assert_eq!(all.len(), 20);

        let key = PartitionKey::from("user-3");
        let keyed = session.read_feed(&scope, Some(&key), 1000).await.unwrap();
        assert!(keyed.iter().any(|doc| doc["id"] == "s3"));

        let sizes = session.collection_sizes(&scope).await.unwrap();
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes.iter().map(|s| s.documents).sum::<usize>(), 20);
        assert_eq!(sizes[0].id, "bucket0");
    }

    #[tokio::test]
    async fn try_delete_tolerates_missing() {
        let (session, scope) = session().await;
        session
            .create_document(&scope, json!({"id": "s1", "user": "ann"}))
            .await
            .unwrap();

        let key = PartitionKey::from("ann");
        assert!(session.try_delete_document(&scope, &key, "s1").await.unwrap());
        assert!(!session.try_delete_document(&scope, &key, "s1").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_document_surfaces_conflict() {
        let (session, scope) = session().await;
        let doc = json!({"id": "s1", "user": "ann"});
        session.create_document(&scope, doc.clone()).await.unwrap();

        let again = session.create_document(&scope, doc).await;
        assert!(matches!(
            again,
            Err(Error::Remote(RemoteError::Conflict(_)))
        ));
    }
}
