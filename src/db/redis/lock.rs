use std::fmt::Display;
use std::time::Duration;

use redis::Client;

use crate::{
    db::store::{LockToken, ProfileLock},
    error::{AppError, AppResult},
};

/// Keys held in Redis on behalf of a profile
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockKey {
    Profile(String),
}

impl Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockKey::Profile(user_id) => write!(f, "qchef:lock:profile:{}", user_id),
        }
    }
}

/// Creates a Redis client for profile locks
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Deletes the key only if it still holds our token
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Per-profile mutual exclusion using `SET NX PX`
///
/// The lock expires after `ttl` so a crashed holder cannot wedge a profile.
#[derive(Clone)]
pub struct RedisProfileLock {
    client: Client,
    ttl: Duration,
    retry_delay: Duration,
    max_attempts: u32,
}

impl RedisProfileLock {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            ttl: Duration::from_secs(10),
            retry_delay: Duration::from_millis(50),
            max_attempts: 40,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

#[async_trait::async_trait]
impl ProfileLock for RedisProfileLock {
    #[tracing::instrument(skip(self))]
    async fn acquire(&self, user_id: &str) -> AppResult<LockToken> {
        let key = LockKey::Profile(user_id.to_string()).to_string();
        let token = uuid::Uuid::new_v4().to_string();
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        for attempt in 1..=self.max_attempts {
            let acquired: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(&token)
                .arg("NX")
                .arg("PX")
                .arg(self.ttl.as_millis() as u64)
                .query_async(&mut conn)
                .await?;

            if acquired.is_some() {
                tracing::debug!(attempt, "Profile lock acquired");
                return Ok(LockToken(token));
            }
            tokio::time::sleep(self.retry_delay).await;
        }

        tracing::warn!(user_id, "Timed out waiting for profile lock");
        Err(AppError::StoreUnavailable(format!(
            "profile {} is locked by another request",
            user_id
        )))
    }

    #[tracing::instrument(skip(self, token))]
    async fn release(&self, user_id: &str, token: LockToken) -> AppResult<()> {
        let key = LockKey::Profile(user_id.to_string()).to_string();
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let released: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(&key)
            .arg(&token.0)
            .invoke_async(&mut conn)
            .await?;

        if released == 0 {
            tracing::warn!(user_id, "Profile lock expired before release");
        }
        Ok(())
    }
}

// Lock round trips need a live Redis; only key layout is covered here

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key_display() {
        let key = LockKey::Profile("user-42".to_string());
        assert_eq!(format!("{}", key), "qchef:lock:profile:user-42");
    }

    #[test]
    fn test_create_client_rejects_bad_url() {
        assert!(create_redis_client("not a url").is_err());
    }

    #[test]
    fn test_with_ttl() {
        let client = create_redis_client("redis://localhost:6379").unwrap();
        let lock = RedisProfileLock::new(client).with_ttl(Duration::from_secs(2));
        assert_eq!(lock.ttl, Duration::from_secs(2));
    }
}
