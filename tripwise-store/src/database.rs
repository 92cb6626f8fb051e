use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use tripwise_core::{RecordStore, StoreError, StoreResult};
use tripwise_shared::Collection;

/// Local durable cache used when the primary store is unreachable.
/// One row per record, keyed by (collection, id).
#[derive(Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
}

fn unavailable(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

impl SqliteCache {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(connection_string)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory cache. The database lives as long as that
    /// connection, so it is never recycled.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running fallback cache migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Fallback cache migrations completed.");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteCache {
    fn name(&self) -> &str {
        "sqlite-cache"
    }

    async fn fetch_all(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT body FROM records WHERE collection = ?1")
                .bind(collection.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(unavailable)?;

        rows.iter()
            .map(|s| serde_json::from_str(s).map_err(StoreError::from))
            .collect()
    }

    async fn fetch(&self, collection: Collection, id: &str) -> StoreResult<Option<Value>> {
        let row: Option<String> =
            sqlx::query_scalar("SELECT body FROM records WHERE collection = ?1 AND id = ?2")
                .bind(collection.as_str())
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;

        match row {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, collection: Collection, id: &str, record: &Value) -> StoreResult<()> {
        let body = serde_json::to_string(record)?;
        sqlx::query(
            r#"
            INSERT INTO records (collection, id, body) VALUES (?1, ?2, ?3)
            ON CONFLICT (collection, id) DO UPDATE SET body = excluded.body, updated_at = datetime('now')
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn swap(
        &self,
        collection: Collection,
        id: &str,
        expected: &Value,
        replacement: &Value,
    ) -> StoreResult<bool> {
        let expected = serde_json::to_string(expected)?;
        let replacement = serde_json::to_string(replacement)?;
        let rows_affected = sqlx::query(
            r#"
            UPDATE records SET body = ?1, updated_at = datetime('now')
            WHERE collection = ?2 AND id = ?3 AND body = ?4
            "#,
        )
        .bind(replacement)
        .bind(collection.as_str())
        .bind(id)
        .bind(expected)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn remove(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        let rows_affected = sqlx::query("DELETE FROM records WHERE collection = ?1 AND id = ?2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?
            .rows_affected();
        Ok(rows_affected > 0)
    }

    async fn create_unique(
        &self,
        collection: Collection,
        key: &str,
        id: &str,
        record: &Value,
    ) -> StoreResult<bool> {
        let body = serde_json::to_string(record)?;
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let claimed = sqlx::query(
            "INSERT OR IGNORE INTO unique_keys (collection, key, record_id) VALUES (?1, ?2, ?3)",
        )
        .bind(collection.as_str())
        .bind(key)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?
        .rows_affected();

        if claimed == 0 {
            tx.rollback().await.map_err(unavailable)?;
            return Ok(false);
        }

        sqlx::query("INSERT INTO records (collection, id, body) VALUES (?1, ?2, ?3)")
            .bind(collection.as_str())
            .bind(id)
            .bind(body)
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;

        tx.commit().await.map_err(unavailable)?;
        Ok(true)
    }

    async fn release_unique(&self, collection: Collection, key: &str, id: &str) -> StoreResult<bool> {
        let rows_affected = sqlx::query(
            "DELETE FROM unique_keys WHERE collection = ?1 AND key = ?2 AND record_id = ?3",
        )
        .bind(collection.as_str())
        .bind(key)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?
        .rows_affected();
        Ok(rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn cache() -> SqliteCache {
        let cache = SqliteCache::in_memory().await.expect("Failed to open cache");
        cache.migrate().await.expect("Failed to migrate cache");
        cache
    }

    #[tokio::test]
    async fn test_put_fetch_remove() {
        let cache = cache().await;
        let record = json!({"id": "u-1", "name": "Ana"});
        cache.put(Collection::Users, "u-1", &record).await.unwrap();

        assert_eq!(cache.fetch(Collection::Users, "u-1").await.unwrap(), Some(record));
        assert!(cache.fetch(Collection::Trips, "u-1").await.unwrap().is_none());
        assert_eq!(cache.fetch_all(Collection::Users).await.unwrap().len(), 1);

        assert!(cache.remove(Collection::Users, "u-1").await.unwrap());
        assert!(!cache.remove(Collection::Users, "u-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_swap_requires_expected_body() {
        let cache = cache().await;
        let v0 = json!({"id": "t-1", "revision": 0});
        let v1 = json!({"id": "t-1", "revision": 1});
        cache.put(Collection::Trips, "t-1", &v0).await.unwrap();

        assert!(cache.swap(Collection::Trips, "t-1", &v0, &v1).await.unwrap());
        // stale expectation loses
        assert!(!cache.swap(Collection::Trips, "t-1", &v0, &v1).await.unwrap());
        assert_eq!(cache.fetch(Collection::Trips, "t-1").await.unwrap(), Some(v1));
    }

    #[tokio::test]
    async fn test_unique_keys() {
        let cache = cache().await;
        let a = json!({"id": "p-1"});
        let b = json!({"id": "p-2"});

        assert!(cache.create_unique(Collection::Participants, "t-1:u-1", "p-1", &a).await.unwrap());
        assert!(!cache.create_unique(Collection::Participants, "t-1:u-1", "p-2", &b).await.unwrap());
        assert!(cache.fetch(Collection::Participants, "p-2").await.unwrap().is_none());

        // a record that never held the key cannot free it
        assert!(!cache.release_unique(Collection::Participants, "t-1:u-1", "p-2").await.unwrap());
        assert!(cache.release_unique(Collection::Participants, "t-1:u-1", "p-1").await.unwrap());
        assert!(cache.create_unique(Collection::Participants, "t-1:u-1", "p-2", &b).await.unwrap());
        assert!(!cache.release_unique(Collection::Participants, "t-1:u-1", "p-1").await.unwrap());
    }
}
