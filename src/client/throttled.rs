//! A [`DocumentClient`] wrapper that enforces a request-rate budget.
//!
//! `ThrottledClient` keeps one token bucket per addressed resource (database
//! or collection link). Each request consumes one token; when the bucket is
//! empty the request is rejected with [`RemoteError::Throttled`] and a
//! `retry_after` equal to the time until a token becomes available, exactly
//! like a provisioned remote store answering 429.
//!
//! ```ignore
//! let client = ThrottledClient::new(inner, ThrottleConfig::new(10.0, 5.0)?);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::time::{Duration, Instant};
use tracing::debug;

use super::{
    CollectionLink, CollectionMetadata, DatabaseLink, DatabaseMetadata, Document, DocumentClient,
    RemoteError, RemoteResult,
};
use crate::error::{ConfigError, Result};

/// Rate budget applied to every addressed resource.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottleConfig {
    /// Tokens added per second.
    pub request_units_per_sec: f64,
    /// Bucket capacity, i.e. the largest burst admitted at once.
    pub burst: f64,
}

impl ThrottleConfig {
    /// Creates a validated budget. Both values must be positive; `burst` must be >= 1.
    pub fn new(request_units_per_sec: f64, burst: f64) -> Result<Self> {
        if !(request_units_per_sec > 0.0) {
            return Err(ConfigError::InvalidThrottle(format!(
                "request_units_per_sec must be positive, got {}",
                request_units_per_sec
            ))
            .into());
        }
        if !(burst >= 1.0) {
            return Err(ConfigError::InvalidThrottle(format!(
                "burst must be at least 1, got {}",
                burst
            ))
            .into());
        }

        Ok(Self {
            request_units_per_sec,
            burst,
        })
    }
}

struct Bucket {
    available: f64,
    last_refill: Instant,
}

/// Rate-limiting decorator around any [`DocumentClient`].
pub struct ThrottledClient<C> {
    inner: Arc<C>,
    config: ThrottleConfig,
    buckets: tokio::sync::Mutex<HashMap<String, Bucket>>,
    rejected: AtomicU64,
}

impl<C: DocumentClient> ThrottledClient<C> {
    /// Wraps `inner` with the given budget.
    pub fn new(inner: Arc<C>, config: ThrottleConfig) -> Self {
        Self {
            inner,
            config,
            buckets: tokio::sync::Mutex::new(HashMap::new()),
            rejected: AtomicU64::new(0),
        }
    }

    /// Returns the wrapped client.
    pub fn inner(&self) -> &Arc<C> {
        &self.inner
    }

    /// Number of requests rejected so far.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Consumes one token for `resource` or reports how long to wait.
    async fn admit(&self, resource: &str) -> std::result::Result<(), RemoteError> {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry(resource.to_string()).or_insert(Bucket {
            available: self.config.burst,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.available =
            (bucket.available + elapsed * self.config.request_units_per_sec).min(self.config.burst);
        bucket.last_refill = now;

        if bucket.available >= 1.0 {
            bucket.available -= 1.0;
            return Ok(());
        }

        let deficit = 1.0 - bucket.available;
        let wait_ms = (deficit / self.config.request_units_per_sec * 1000.0).ceil() as u64;
        let retry_after = Duration::from_millis(wait_ms.max(1));

        self.rejected.fetch_add(1, Ordering::Relaxed);
        debug!(
            resource,
            retry_after_ms = retry_after.as_millis() as u64,
            "request rate exceeded"
        );
        Err(RemoteError::throttled(
            format!("request rate too large for {}", resource),
            Some(retry_after),
        ))
    }
}

#[async_trait::async_trait]
impl<C: DocumentClient> DocumentClient for ThrottledClient<C> {
    async fn create_database(&self, id: &str) -> RemoteResult<DatabaseMetadata> {
        self.admit(DatabaseLink::new(id).as_str()).await?;
        self.inner.create_database(id).await
    }

    async fn read_database(&self, id: &str) -> RemoteResult<DatabaseMetadata> {
        self.admit(DatabaseLink::new(id).as_str()).await?;
        self.inner.read_database(id).await
    }

    async fn create_collection(
        &self,
        database: &DatabaseLink,
        id: &str,
    ) -> RemoteResult<CollectionMetadata> {
        self.admit(database.as_str()).await?;
        self.inner.create_collection(database, id).await
    }

    async fn read_collection(&self, collection: &CollectionLink) -> RemoteResult<CollectionMetadata> {
        self.admit(collection.as_str()).await?;
        self.inner.read_collection(collection).await
    }

    async fn create_document(
        &self,
        collection: &CollectionLink,
        document: Document,
    ) -> RemoteResult<Document> {
        self.admit(collection.as_str()).await?;
        self.inner.create_document(collection, document).await
    }

    async fn read_document(&self, collection: &CollectionLink, id: &str) -> RemoteResult<Document> {
        self.admit(collection.as_str()).await?;
        self.inner.read_document(collection, id).await
    }

    async fn read_document_feed(
        &self,
        collection: &CollectionLink,
        max_items: usize,
    ) -> RemoteResult<Vec<Document>> {
        self.admit(collection.as_str()).await?;
        self.inner.read_document_feed(collection, max_items).await
    }

    async fn delete_document(&self, collection: &CollectionLink, id: &str) -> RemoteResult<()> {
        self.admit(collection.as_str()).await?;
        self.inner.delete_document(collection, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RedbDocumentClient;

    fn throttled(rate: f64, burst: f64) -> ThrottledClient<RedbDocumentClient> {
        let inner = Arc::new(RedbDocumentClient::in_memory().unwrap());
        ThrottledClient::new(inner, ThrottleConfig::new(rate, burst).unwrap())
    }

    #[test]
    fn config_rejects_non_positive_values() {
        assert!(ThrottleConfig::new(0.0, 1.0).is_err());
        assert!(ThrottleConfig::new(10.0, 0.5).is_err());
        assert!(ThrottleConfig::new(f64::NAN, 1.0).is_err());
        assert!(ThrottleConfig::new(10.0, 2.0).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_then_throttle() {
        let client = throttled(10.0, 2.0);

        assert!(client.admit("dbs/a").await.is_ok());
        assert!(client.admit("dbs/a").await.is_ok());

        let err = client.admit("dbs/a").await.unwrap_err();
        assert!(err.is_throttled());
        assert_eq!(err.retry_after(), Some(Duration::from_millis(100)));
        assert_eq!(client.rejected(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn buckets_are_per_resource() {
        let client = throttled(1.0, 1.0);

        assert!(client.admit("dbs/a/colls/0").await.is_ok());
        assert!(client.admit("dbs/a/colls/1").await.is_ok());
        assert!(client.admit("dbs/a/colls/0").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_refill_over_time() {
        let client = throttled(10.0, 1.0);

        assert!(client.admit("dbs/a").await.is_ok());
        assert!(client.admit("dbs/a").await.is_err());

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(client.admit("dbs/a").await.is_ok());
    }

    #[tokio::test]
    async fn rejected_calls_never_reach_inner_store() {
        let client = throttled(1.0, 1.0);

        client.create_database("tweets").await.unwrap();
        let err = client.read_database("tweets").await.unwrap_err();
        assert!(err.is_throttled());

        // The inner store saw the create and is unaffected by the rejection.
        let inner = client.inner().read_database("tweets").await.unwrap();
        assert_eq!(inner.resource.id, "tweets");
    }
}
