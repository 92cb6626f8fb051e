use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tripwise_core::{RecordStore, StoreError, StoreResult};
use tripwise_shared::Collection;

#[derive(Default)]
struct Tables {
    records: HashMap<Collection, HashMap<String, Value>>,
    unique_keys: HashMap<Collection, HashMap<String, String>>,
}

/// Process-local backend for tests and local development. Outages can be
/// simulated, either for the whole store or for writes to one collection.
pub struct MemoryStore {
    name: String,
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
    failing_writes: RwLock<HashSet<Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tables: RwLock::new(Tables::default()),
            unavailable: AtomicBool::new(false),
            failing_writes: RwLock::new(HashSet::new()),
        }
    }

    /// Every call fails with `Unavailable` while set
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    /// Writes to `collection` fail with `Unavailable` until `heal` is called
    pub async fn fail_writes_to(&self, collection: Collection) {
        self.failing_writes.write().await.insert(collection);
    }

    pub async fn heal(&self) {
        self.failing_writes.write().await.clear();
        self.set_unavailable(false);
    }

    pub async fn len(&self, collection: Collection) -> usize {
        self.tables
            .read()
            .await
            .records
            .get(&collection)
            .map_or(0, |t| t.len())
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{} is down", self.name)));
        }
        Ok(())
    }

    async fn check_writable(&self, collection: Collection) -> StoreResult<()> {
        self.check_available()?;
        if self.failing_writes.read().await.contains(&collection) {
            return Err(StoreError::Unavailable(format!(
                "{} rejected write to {}",
                self.name, collection
            )));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_all(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .records
            .get(&collection)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn fetch(&self, collection: Collection, id: &str) -> StoreResult<Option<Value>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.records.get(&collection).and_then(|t| t.get(id)).cloned())
    }

    async fn put(&self, collection: Collection, id: &str, record: &Value) -> StoreResult<()> {
        self.check_writable(collection).await?;
        let mut tables = self.tables.write().await;
        tables
            .records
            .entry(collection)
            .or_default()
            .insert(id.to_string(), record.clone());
        Ok(())
    }

    async fn swap(
        &self,
        collection: Collection,
        id: &str,
        expected: &Value,
        replacement: &Value,
    ) -> StoreResult<bool> {
        self.check_writable(collection).await?;
        let mut tables = self.tables.write().await;
        match tables.records.get_mut(&collection).and_then(|t| t.get_mut(id)) {
            Some(current) if *current == *expected => {
                *current = replacement.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        self.check_writable(collection).await?;
        let mut tables = self.tables.write().await;
        Ok(tables
            .records
            .get_mut(&collection)
            .and_then(|t| t.remove(id))
            .is_some())
    }

    async fn create_unique(
        &self,
        collection: Collection,
        key: &str,
        id: &str,
        record: &Value,
    ) -> StoreResult<bool> {
        self.check_writable(collection).await?;
        let mut tables = self.tables.write().await;
        let keys = tables.unique_keys.entry(collection).or_default();
        if keys.contains_key(key) {
            return Ok(false);
        }
        keys.insert(key.to_string(), id.to_string());
        tables
            .records
            .entry(collection)
            .or_default()
            .insert(id.to_string(), record.clone());
        Ok(true)
    }

    async fn release_unique(&self, collection: Collection, key: &str, id: &str) -> StoreResult<bool> {
        self.check_writable(collection).await?;
        let mut tables = self.tables.write().await;
        let Some(keys) = tables.unique_keys.get_mut(&collection) else {
            return Ok(false);
        };
        if keys.get(key).map(String::as_str) != Some(id) {
            return Ok(false);
        }
        keys.remove(key);
        Ok(true)
    }
}
