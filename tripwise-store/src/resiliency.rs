use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use tripwise_core::{RecordStore, StoreError, StoreResult};
use tripwise_shared::Collection;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,   // Normal operation
    Open,     // Primary failing, go straight to fallback
    HalfOpen, // Probing the primary again
}

pub struct CircuitBreaker {
    pub name: String,
    pub state: RwLock<CircuitState>,
    pub failure_count: AtomicUsize,
    pub failure_threshold: usize,
    pub reset_timeout: Duration,
    pub last_failure: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: usize, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicUsize::new(0),
            failure_threshold: threshold.max(1),
            reset_timeout: timeout,
            last_failure: RwLock::new(None),
        }
    }

    pub async fn current(&self) -> CircuitState {
        *self.state.read().await
    }

    /// Whether the protected call should be attempted
    pub async fn check(&self) -> bool {
        let state = *self.state.read().await;
        if state == CircuitState::Closed {
            return true;
        }

        if state == CircuitState::Open {
            let last_fail = *self.last_failure.read().await;
            if let Some(instant) = last_fail {
                if instant.elapsed() > self.reset_timeout {
                    let mut s = self.state.write().await;
                    *s = CircuitState::HalfOpen;
                    tracing::info!("Circuit Breaker [{}] moving to Half-Open", self.name);
                    return true;
                }
            }
            return false;
        }

        true
    }

    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        if *state == CircuitState::HalfOpen {
            *state = CircuitState::Closed;
            self.failure_count.store(0, Ordering::SeqCst);
            tracing::info!("Circuit Breaker [{}] recovered to Closed", self.name);
        } else if *state == CircuitState::Closed {
            self.failure_count.store(0, Ordering::SeqCst);
        }
    }

    pub async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.write().await;

        if count >= self.failure_threshold || *state == CircuitState::HalfOpen {
            *state = CircuitState::Open;
            let mut last = self.last_failure.write().await;
            *last = Some(Instant::now());
            tracing::error!("Circuit Breaker [{}] TRIPPED to Open. Failures: {}", self.name, count);
        }
    }
}

/// Primary store with a last-resort fallback. Each primitive is retried on
/// the fallback when the primary is unreachable; nothing is replicated back.
pub struct FallbackStore {
    primary: Arc<dyn RecordStore>,
    fallback: Arc<dyn RecordStore>,
    breaker: CircuitBreaker,
}

impl FallbackStore {
    pub fn new(
        primary: Arc<dyn RecordStore>,
        fallback: Arc<dyn RecordStore>,
        breaker: CircuitBreaker,
    ) -> Self {
        Self { primary, fallback, breaker }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    async fn run<T, F, Fut>(&self, op: &str, collection: Collection, call: F) -> StoreResult<T>
    where
        F: Fn(Arc<dyn RecordStore>) -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        if self.breaker.check().await {
            match call(self.primary.clone()).await {
                Ok(v) => {
                    self.breaker.record_success().await;
                    return Ok(v);
                }
                Err(StoreError::Unavailable(reason)) => {
                    self.breaker.record_failure().await;
                    warn!(
                        "{} {} on {} failed ({}), using {}",
                        op, collection, self.primary.name(), reason, self.fallback.name()
                    );
                }
                Err(e) => return Err(e),
            }
        } else {
            debug!("{} {} routed to {} (circuit open)", op, collection, self.fallback.name());
        }

        call(self.fallback.clone()).await.map_err(|e| match e {
            StoreError::Unavailable(reason) => StoreError::Unavailable(format!(
                "{} and {} both unavailable: {}",
                self.primary.name(),
                self.fallback.name(),
                reason
            )),
            other => other,
        })
    }
}

#[async_trait]
impl RecordStore for FallbackStore {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn fetch_all(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        self.run("fetch_all", collection, |s| async move { s.fetch_all(collection).await })
            .await
    }

    async fn fetch(&self, collection: Collection, id: &str) -> StoreResult<Option<Value>> {
        self.run("fetch", collection, |s| async move { s.fetch(collection, id).await })
            .await
    }

    async fn put(&self, collection: Collection, id: &str, record: &Value) -> StoreResult<()> {
        self.run("put", collection, |s| async move { s.put(collection, id, record).await })
            .await
    }

    async fn swap(
        &self,
        collection: Collection,
        id: &str,
        expected: &Value,
        replacement: &Value,
    ) -> StoreResult<bool> {
        self.run("swap", collection, |s| async move {
            s.swap(collection, id, expected, replacement).await
        })
        .await
    }

    async fn remove(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        self.run("remove", collection, |s| async move { s.remove(collection, id).await })
            .await
    }

    async fn create_unique(
        &self,
        collection: Collection,
        key: &str,
        id: &str,
        record: &Value,
    ) -> StoreResult<bool> {
        self.run("create_unique", collection, |s| async move {
            s.create_unique(collection, key, id, record).await
        })
        .await
    }

    async fn release_unique(&self, collection: Collection, key: &str, id: &str) -> StoreResult<bool> {
        self.run("release_unique", collection, |s| async move {
            s.release_unique(collection, key, id).await
        })
        .await
    }
}
