use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::metrics::{record_cache_hit, record_cache_miss, track_cache_operation};

pub const FACTORS_KEY: &str = "factors";

pub fn leaderboard_key(challenge_id: &str) -> String {
    format!("leaderboard:{}", challenge_id)
}

/// JSON read-through cache in Redis.
///
/// Every failure is logged and treated as a miss; callers always fall back to
/// the source of truth. Without a connection the cache is a no-op.
#[derive(Clone)]
pub struct CacheService {
    redis_conn: Option<ConnectionManager>,
}

impl CacheService {
    pub fn new(redis_conn: ConnectionManager) -> Self {
        Self {
            redis_conn: Some(redis_conn),
        }
    }

    pub fn disabled() -> Self {
        Self { redis_conn: None }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let conn = self.redis_conn.as_ref()?;

        let raw: Option<String> =
            match track_cache_operation("get", conn.clone().get::<_, Option<String>>(key)).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(key, error = %e, "Cache read failed");
                    return None;
                }
            };

        match raw.map(|value| serde_json::from_str::<T>(&value)) {
            Some(Ok(value)) => {
                record_cache_hit();
                Some(value)
            }
            Some(Err(e)) => {
                warn!(key, error = %e, "Discarding undecodable cache entry");
                record_cache_miss();
                None
            }
            None => {
                record_cache_miss();
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let Some(conn) = &self.redis_conn else {
            return;
        };

        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key, error = %e, "Failed to encode cache entry");
                return;
            }
        };

        let result: Result<(), _> =
            track_cache_operation("set", conn.clone().set_ex(key, payload, ttl_secs)).await;
        if let Err(e) = result {
            warn!(key, error = %e, "Cache write failed");
        }
    }

    /// `None` when no Redis connection is configured
    pub async fn ping(&self) -> Option<Result<(), redis::RedisError>> {
        let mut conn = self.redis_conn.clone()?;
        Some(
            redis::cmd("PING")
                .query_async::<String>(&mut conn)
                .await
                .map(|_| ()),
        )
    }

    pub async fn invalidate(&self, key: &str) {
        let Some(conn) = &self.redis_conn else {
            return;
        };

        let result: Result<(), _> = track_cache_operation("del", conn.clone().del(key)).await;
        match result {
            Ok(()) => debug!(key, "Cache entry invalidated"),
            Err(e) => warn!(key, error = %e, "Cache invalidation failed"),
        }
    }
}
