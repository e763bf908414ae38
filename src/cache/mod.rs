use redis::{aio::ConnectionManager, Client};
use tracing::info;

pub mod events;

#[derive(Clone)]
pub struct RedisClient {
    pub conn: ConnectionManager,
}

impl RedisClient {
    /// ConnectionManager сам переподключается после обрыва соединения
    pub async fn connect(redis_url: &str) -> redis::RedisResult<Self> {
        let conn = ConnectionManager::new(Client::open(redis_url)?).await?;
        Ok(Self { conn })
    }
}

/// Кеш страниц событий в Redis. Без Redis все операции ничего не делают,
/// и запросы идут напрямую в хранилище.
#[derive(Clone)]
pub struct CacheService {
    redis: Option<RedisClient>,
    ttl_seconds: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, ttl_seconds: u64) -> Self {
        info!("Event cache enabled (ttl {}s)", ttl_seconds);
        Self {
            redis: Some(redis),
            ttl_seconds,
        }
    }

    pub fn disabled() -> Self {
        Self {
            redis: None,
            ttl_seconds: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.redis.is_some()
    }
}
