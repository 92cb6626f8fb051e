use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::Value;
use tracing::info;
use tripwise_core::{RecordStore, StoreError, StoreResult};
use tripwise_shared::Collection;

// Replace a hash field only if it still holds the expected serialized record
const SWAP_SCRIPT: &str = r#"
    local current = redis.call("HGET", KEYS[1], ARGV[1])
    if current == ARGV[2] then
        redis.call("HSET", KEYS[1], ARGV[1], ARGV[3])
        return 1
    end
    return 0
"#;

// Claim the guard key and write the record in one step
const CREATE_UNIQUE_SCRIPT: &str = r#"
    if redis.call("SET", KEYS[2], ARGV[1], "NX") then
        redis.call("HSET", KEYS[1], ARGV[1], ARGV[2])
        return 1
    end
    return 0
"#;

// Delete the guard key only while it still names the releasing record
const RELEASE_UNIQUE_SCRIPT: &str = r#"
    if redis.call("GET", KEYS[1]) == ARGV[1] then
        return redis.call("DEL", KEYS[1])
    end
    return 0
"#;

/// Primary record store. Each collection is a hash `records:{collection}`
/// mapping id to the JSON record.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
}

fn unavailable(err: redis::RedisError) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn records_key(collection: Collection) -> String {
    format!("records:{}", collection)
}

fn guard_key(collection: Collection, key: &str) -> String {
    format!("guard:{}:{}", collection, key)
}

impl RedisStore {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        info!("Redis record store configured");
        Ok(Self { client })
    }

    async fn connection(&self) -> StoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)
    }
}

#[async_trait]
impl RecordStore for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn fetch_all(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        let mut conn = self.connection().await?;
        let raw: Vec<String> = conn.hvals(records_key(collection)).await.map_err(unavailable)?;
        raw.iter()
            .map(|s| serde_json::from_str(s).map_err(StoreError::from))
            .collect()
    }

    async fn fetch(&self, collection: Collection, id: &str) -> StoreResult<Option<Value>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.hget(records_key(collection), id).await.map_err(unavailable)?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, collection: Collection, id: &str, record: &Value) -> StoreResult<()> {
        let body = serde_json::to_string(record)?;
        let mut conn = self.connection().await?;
        conn.hset::<_, _, _, ()>(records_key(collection), id, body)
            .await
            .map_err(unavailable)
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
        let mut conn = self.connection().await?;

        let swapped: i64 = redis::Script::new(SWAP_SCRIPT)
            .key(records_key(collection))
            .arg(id)
            .arg(expected)
            .arg(replacement)
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(swapped == 1)
    }

    async fn remove(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn.hdel(records_key(collection), id).await.map_err(unavailable)?;
        Ok(removed > 0)
    }

    async fn create_unique(
        &self,
        collection: Collection,
        key: &str,
        id: &str,
        record: &Value,
    ) -> StoreResult<bool> {
        let body = serde_json::to_string(record)?;
        let mut conn = self.connection().await?;

        let created: i64 = redis::Script::new(CREATE_UNIQUE_SCRIPT)
            .key(records_key(collection))
            .key(guard_key(collection, key))
            .arg(id)
            .arg(body)
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(created == 1)
    }

    async fn release_unique(&self, collection: Collection, key: &str, id: &str) -> StoreResult<bool> {
        let mut conn = self.connection().await?;

        let released: i64 = redis::Script::new(RELEASE_UNIQUE_SCRIPT)
            .key(guard_key(collection, key))
            .arg(id)
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(released == 1)
    }
}
