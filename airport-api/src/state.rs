use std::sync::Arc;

use airport_core::Store;
use airport_order::OrderBuilder;
use airport_store::app_config::{Config, PaginationConfig, RateLimitConfig};
use airport_store::RedisClient;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub orders: Arc<OrderBuilder>,
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub pagination: PaginationConfig,
    pub metrics: Metrics,
}

impl AppState {
    /// Wires every handler dependency to the same backing store
    pub fn new<S>(store: Arc<S>, config: &Config, redis: Option<Arc<RedisClient>>) -> Result<Self, prometheus::Error>
    where
        S: Store + 'static,
    {
        Ok(Self {
            orders: Arc::new(OrderBuilder::new(store.clone())),
            store,
            redis,
            auth: AuthConfig {
                secret: config.auth.jwt_secret.clone(),
            },
            rate_limit: config.rate_limit.clone(),
            pagination: config.pagination.clone(),
            metrics: Metrics::new()?,
        })
    }
}
