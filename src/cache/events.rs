use crate::cache::CacheService;
use crate::models::Event;
use redis::AsyncCommands;
use tracing::{debug, warn};

const EVENTS_PREFIX: &str = "events:";
const COUNT_KEY: &str = "events:count";

pub fn page_key(page: u32, page_size: u32) -> String {
    format!("{EVENTS_PREFIX}page:{page}:{page_size}")
}

pub fn featured_key(limit: u32) -> String {
    format!("{EVENTS_PREFIX}featured:{limit}")
}

impl CacheService {
    // Получить страницу событий; ошибка Redis = промах
    pub async fn get_events(&self, key: &str) -> Option<Vec<Event>> {
        let redis = self.redis.as_ref()?;
        let mut conn = redis.conn.clone();
        let data: Option<String> = match conn.get(key).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Cache read failed for {}: {:?}", key, e);
                return None;
            }
        };
        let events = serde_json::from_str(&data?).ok();
        debug!("Cache {} for {}", if events.is_some() { "hit" } else { "miss" }, key);
        events
    }

    pub async fn put_events(&self, key: &str, events: &[Event]) {
        let Some(redis) = self.redis.as_ref() else { return };
        let Ok(data) = serde_json::to_string(events) else { return };
        let mut conn = redis.conn.clone();
        let res: Result<(), redis::RedisError> = conn.set_ex(key, data, self.ttl_seconds).await;
        if let Err(e) = res {
            warn!("Cache write failed for {}: {:?}", key, e);
        }
    }

    pub async fn get_event_count(&self) -> Option<i64> {
        let redis = self.redis.as_ref()?;
        let mut conn = redis.conn.clone();
        let count: Result<Option<i64>, redis::RedisError> = conn.get(COUNT_KEY).await;
        count.ok().flatten()
    }

    pub async fn put_event_count(&self, count: i64) {
        let Some(redis) = self.redis.as_ref() else { return };
        let mut conn = redis.conn.clone();
        let res: Result<(), redis::RedisError> =
            conn.set_ex(COUNT_KEY, count, self.ttl_seconds).await;
        if let Err(e) = res {
            warn!("Cache write failed for {}: {:?}", COUNT_KEY, e);
        }
    }

    /// Сбросить все закешированные страницы после изменения событий
    pub async fn invalidate_events(&self) {
        let Some(redis) = self.redis.as_ref() else { return };
        let mut conn = redis.conn.clone();
        let keys: Vec<String> = match conn.keys(format!("{EVENTS_PREFIX}*")).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Cache invalidation failed: {:?}", e);
                return;
            }
        };
        if keys.is_empty() {
            return;
        }
        let res: Result<(), redis::RedisError> = conn.del(&keys).await;
        match res {
            Ok(()) => debug!("Invalidated {} cached event keys", keys.len()),
            Err(e) => warn!("Cache invalidation failed: {:?}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_share_invalidation_prefix() {
        assert_eq!(page_key(2, 9), "events:page:2:9");
        assert!(featured_key(5).starts_with(EVENTS_PREFIX));
        assert!(COUNT_KEY.starts_with(EVENTS_PREFIX));
    }

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let cache = CacheService::disabled();
        assert!(!cache.is_enabled());
        cache.put_events(&page_key(1, 9), &[]).await;
        cache.put_event_count(3).await;
        assert!(cache.get_events(&page_key(1, 9)).await.is_none());
        assert!(cache.get_event_count().await.is_none());
        cache.invalidate_events().await;
    }
}
