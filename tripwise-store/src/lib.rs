pub mod app_config;
pub mod redis_repo;
pub mod database;
pub mod memory;
pub mod resiliency;
pub mod gateway;

pub use redis_repo::RedisStore;
pub use database::SqliteCache;
pub use memory::MemoryStore;
pub use resiliency::{CircuitBreaker, CircuitState, FallbackStore};
pub use gateway::{CasOutcome, Filter, PersistenceGateway};
