pub mod config;
pub mod error;
pub mod extractors;
pub mod models;
pub mod policy;
pub mod store;
pub mod cache;
pub mod services;
pub mod middleware;
pub mod controllers;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use config::{Config, StorageBackend};
use store::{MemoryStore, PgStore, Store};

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: cache::CacheService,
    pub auth: services::auth::AuthService,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let store: Arc<dyn Store> = match config.database.backend {
            StorageBackend::Postgres => {
                let url = config
                    .database
                    .url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;
                let pg = PgStore::connect(url, config.database.pool_size).await?;
                info!("Database connected");
                pg.run_migrations().await?;
                Arc::new(pg)
            }
            StorageBackend::Memory => {
                info!("Using in-memory storage");
                Arc::new(MemoryStore::new())
            }
        };

        let cache = match (config.features.enable_cache, config.redis.url.as_deref()) {
            (true, Some(url)) => {
                let redis = cache::RedisClient::connect(url).await?;
                info!("Redis connected");
                cache::CacheService::new(redis, config.redis.ttl_seconds)
            }
            _ => cache::CacheService::disabled(),
        };

        Ok(Arc::new(Self::with_store(store, cache, config)))
    }

    pub fn with_store(store: Arc<dyn Store>, cache: cache::CacheService, config: Config) -> Self {
        let auth = services::auth::AuthService::new(&config.auth);
        Self {
            store,
            cache,
            auth,
            config,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Event Booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
