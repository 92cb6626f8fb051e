use async_trait::async_trait;
use serde_json::Value;
use tripwise_shared::Collection;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Transport failure or the backend refused the request
    #[error("Record store unavailable: {0}")]
    Unavailable(String),
    #[error("Record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Backend for the persistence gateway. Records are JSON objects keyed by an
/// opaque id within a collection. Every method is atomic on its own; callers
/// compose them into read-modify-write loops with [`RecordStore::swap`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    async fn fetch_all(&self, collection: Collection) -> StoreResult<Vec<Value>>;

    async fn fetch(&self, collection: Collection, id: &str) -> StoreResult<Option<Value>>;

    /// Insert or overwrite
    async fn put(&self, collection: Collection, id: &str, record: &Value) -> StoreResult<()>;

    /// Replace the record only if it still equals `expected`. Returns false
    /// when the record changed underneath (or is gone).
    async fn swap(
        &self,
        collection: Collection,
        id: &str,
        expected: &Value,
        replacement: &Value,
    ) -> StoreResult<bool>;

    async fn remove(&self, collection: Collection, id: &str) -> StoreResult<bool>;

    /// Insert `record` only if no other record holds `key` in this
    /// collection. Returns false (and writes nothing) if the key is taken.
    async fn create_unique(
        &self,
        collection: Collection,
        key: &str,
        id: &str,
        record: &Value,
    ) -> StoreResult<bool>;

    /// Free a key taken by `create_unique`, but only while it still points
    /// at `id`. Returns false if the key is free or held by another record.
    async fn release_unique(&self, collection: Collection, key: &str, id: &str) -> StoreResult<bool>;
}
