use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub cache: CacheConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_advance_percentage")]
    pub default_advance_percentage: u32,
    /// Attempts at a conditional trip write before giving up
    #[serde(default = "default_join_retry_limit")]
    pub join_retry_limit: usize,
    #[serde(default = "default_breaker_threshold")]
    pub breaker_failure_threshold: usize,
    #[serde(default = "default_breaker_reset")]
    pub breaker_reset_seconds: u64,
}

fn default_advance_percentage() -> u32 { tripwise_shared::DEFAULT_ADVANCE_PERCENTAGE }
fn default_join_retry_limit() -> usize { 16 }
fn default_breaker_threshold() -> usize { 3 }
fn default_breaker_reset() -> u64 { 30 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            default_advance_percentage: default_advance_percentage(),
            join_retry_limit: default_join_retry_limit(),
            breaker_failure_threshold: default_breaker_threshold(),
            breaker_reset_seconds: default_breaker_reset(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub database_url: String,
    #[serde(default = "default_cache_connections")]
    pub max_connections: u32,
}

fn default_cache_connections() -> u32 { 4 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `TRIPWISE__REDIS__URL=redis://cache:6379`
            .add_source(config::Environment::with_prefix("TRIPWISE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
