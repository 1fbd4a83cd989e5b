use redis::RedisResult;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter. Returns `true` while `key` is within `limit`
    /// requests for the current window. The window starts with the first
    /// request and is not extended by later ones.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count, ttl): (i64, i64) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .ttl(key)
            .query_async(&mut conn)
            .await?;

        if starts_window(count, ttl) {
            redis::cmd("EXPIRE")
                .arg(key)
                .arg(window_seconds)
                .query_async::<()>(&mut conn)
                .await?;
        }

        Ok(count <= limit)
    }
}

/// Whether the counter needs its expiry set: on the request that created it,
/// or when an earlier request died before setting one (`TTL` of -1).
fn starts_window(count: i64, ttl: i64) -> bool {
    count == 1 || ttl == -1
}
