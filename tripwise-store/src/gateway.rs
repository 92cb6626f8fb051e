use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;
use tripwise_core::{RecordStore, StoreError, StoreResult};
use tripwise_shared::Collection;

const DEFAULT_RETRY_LIMIT: usize = 16;

/// Field-equality predicate applied to listed records
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((field.to_string(), value.into()));
        self
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Swapped,
    /// Stored revision differs from the expected one
    Conflict,
    Missing,
}

fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

fn revision_of(record: &Value) -> u64 {
    record.get("revision").and_then(Value::as_u64).unwrap_or(0)
}

/// Top-level merge; the record id is never overwritten
fn merge(current: &Value, patch: &Value) -> Value {
    let mut merged = current.as_object().cloned().unwrap_or_else(Map::new);
    if let Some(fields) = patch.as_object() {
        for (k, v) in fields {
            if k != "id" {
                merged.insert(k.clone(), v.clone());
            }
        }
    }
    Value::Object(merged)
}

/// Record CRUD over named collections. The backend decides where records
/// live; a [`crate::FallbackStore`] gives the primary/fallback behaviour.
#[derive(Clone)]
pub struct PersistenceGateway {
    store: Arc<dyn RecordStore>,
    retry_limit: usize,
}

impl PersistenceGateway {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store, retry_limit: DEFAULT_RETRY_LIMIT }
    }

    pub fn with_retry_limit(mut self, retry_limit: usize) -> Self {
        self.retry_limit = retry_limit.max(1);
        self
    }

    pub fn retry_limit(&self) -> usize {
        self.retry_limit
    }

    pub async fn list(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Value>> {
        let records = self.store.fetch_all(collection).await?;
        Ok(records.into_iter().filter(|r| filter.matches(r)).collect())
    }

    pub async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Value>> {
        self.store.fetch(collection, id).await
    }

    /// Append a record, generating an id if it has none
    pub async fn insert(&self, collection: Collection, record: Value) -> StoreResult<Value> {
        let (id, record) = Self::with_id(record)?;
        self.store.put(collection, &id, &record).await?;
        debug!("Inserted {} {}", collection, id);
        Ok(record)
    }

    /// Merge `patch` into the stored record. `None` if there is no such record.
    pub async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: &Value,
    ) -> StoreResult<Option<Value>> {
        for _ in 0..self.retry_limit {
            let Some(current) = self.store.fetch(collection, id).await? else {
                return Ok(None);
            };
            let merged = merge(&current, patch);
            if self.store.swap(collection, id, &current, &merged).await? {
                return Ok(Some(merged));
            }
        }
        Err(StoreError::Unavailable(format!(
            "update of {} {} lost {} races",
            collection, id, self.retry_limit
        )))
    }

    pub async fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        self.store.remove(collection, id).await
    }

    /// Replace the record only if its stored `revision` is still
    /// `expected_revision`.
    pub async fn compare_and_swap(
        &self,
        collection: Collection,
        id: &str,
        expected_revision: u64,
        record: &Value,
    ) -> StoreResult<CasOutcome> {
        let Some(current) = self.store.fetch(collection, id).await? else {
            return Ok(CasOutcome::Missing);
        };
        if revision_of(&current) != expected_revision {
            return Ok(CasOutcome::Conflict);
        }
        if self.store.swap(collection, id, &current, record).await? {
            Ok(CasOutcome::Swapped)
        } else {
            Ok(CasOutcome::Conflict)
        }
    }

    /// Insert only if `key` is free. `None` if another record holds it.
    pub async fn create_unique(
        &self,
        collection: Collection,
        key: &str,
        record: Value,
    ) -> StoreResult<Option<Value>> {
        let (id, record) = Self::with_id(record)?;
        if self.store.create_unique(collection, key, &id, &record).await? {
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }

    /// Free `key` if `holder_id` still holds it. False if it was already
    /// free or has been claimed by another record since.
    pub async fn release_unique(
        &self,
        collection: Collection,
        key: &str,
        holder_id: &str,
    ) -> StoreResult<bool> {
        self.store.release_unique(collection, key, holder_id).await
    }

    pub async fn get_as<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
    ) -> StoreResult<Option<T>> {
        match self.get(collection, id).await? {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    pub async fn list_as<T: DeserializeOwned>(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Vec<T>> {
        self.list(collection, filter)
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(StoreError::from))
            .collect()
    }

    pub fn to_record<T: Serialize>(value: &T) -> StoreResult<Value> {
        Ok(serde_json::to_value(value)?)
    }

    fn with_id(record: Value) -> StoreResult<(String, Value)> {
        if let Some(id) = record_id(&record) {
            return Ok((id.to_string(), record));
        }
        let mut fields = match record {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Serialization(serde::de::Error::custom(format!(
                    "records must be JSON objects, got {}",
                    other
                ))))
            }
        };
        let id = Uuid::new_v4().to_string();
        fields.insert("id".to_string(), Value::String(id.clone()));
        Ok((id, Value::Object(fields)))
    }
}
