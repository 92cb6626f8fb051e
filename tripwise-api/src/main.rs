use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tripwise_api::{app, AppState};
use tripwise_store::app_config::Config;
use tripwise_store::{CircuitBreaker, FallbackStore, PersistenceGateway, RedisStore, SqliteCache};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tripwise_api=debug,tripwise_booking=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Tripwise API on port {}", config.server.port);
    let rules = &config.business_rules;

    // Primary store
    let redis = RedisStore::new(&config.redis.url)
        .await
        .context("Failed to configure Redis")?;

    // Local fallback cache
    let cache = SqliteCache::new(&config.cache.database_url, config.cache.max_connections)
        .await
        .context("Failed to open fallback cache")?;
    cache.migrate().await.context("Failed to migrate fallback cache")?;

    let breaker = CircuitBreaker::new(
        "record-store",
        rules.breaker_failure_threshold,
        Duration::from_secs(rules.breaker_reset_seconds),
    );
    let store = FallbackStore::new(Arc::new(redis), Arc::new(cache), breaker);
    let gateway = PersistenceGateway::new(Arc::new(store)).with_retry_limit(rules.join_retry_limit);

    let app = app(AppState::new(gateway, rules));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
