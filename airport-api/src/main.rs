use std::net::SocketAddr;
use std::sync::Arc;

use airport_api::{app, AppState};
use airport_store::app_config::Config;
use airport_store::{DbClient, MemoryStore, RedisClient};
use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "airport_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Airport API on port {}", config.server.port);

    // Redis Connection
    let redis = match &config.redis {
        Some(redis_config) => {
            let client = RedisClient::new(&redis_config.url)
                .await
                .context("Failed to connect to Redis")?;
            Some(Arc::new(client))
        }
        None => {
            tracing::info!("Redis not configured, rate limiting disabled");
            None
        }
    };

    let app_state = if config.database.is_memory() {
        tracing::warn!("Using the in-memory store, data is lost on shutdown");
        AppState::new(Arc::new(MemoryStore::new()), &config, redis)?
    } else {
        let db = DbClient::new(&config.database.url, config.database.max_connections)
            .await
            .context("Failed to connect to Postgres")?;
        db.migrate().await.context("Failed to run migrations")?;
        AppState::new(Arc::new(db.store()), &config, redis)?
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
