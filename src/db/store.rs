use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::{error::AppResult, models::UserProfile};

/// Persistence boundary for user profiles
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_profile(&self, user_id: &str) -> AppResult<Option<UserProfile>>;

    /// Stores a new profile; returns `false` if the user already has one
    async fn create_profile(&self, profile: &UserProfile) -> AppResult<bool>;

    async fn persist_profile(&self, profile: &UserProfile) -> AppResult<()>;
}

/// Opaque proof of a held profile lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(pub String);

/// Serializes read-modify-write cycles on one profile
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProfileLock: Send + Sync {
    async fn acquire(&self, user_id: &str) -> AppResult<LockToken>;

    async fn release(&self, user_id: &str, token: LockToken) -> AppResult<()>;
}

/// Process-local profile store
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn fetch_profile(&self, user_id: &str) -> AppResult<Option<UserProfile>> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn create_profile(&self, profile: &UserProfile) -> AppResult<bool> {
        let mut profiles = self.profiles.write().await;
        if profiles.contains_key(&profile.user_id) {
            return Ok(false);
        }
        profiles.insert(profile.user_id.clone(), profile.clone());
        Ok(true)
    }

    async fn persist_profile(&self, profile: &UserProfile) -> AppResult<()> {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }
}

/// Lock that never blocks; for single-process development and tests only
///
/// Concurrent updates to one profile can overwrite each other between the
/// fetch and the persist.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProfileLock;

#[async_trait::async_trait]
impl ProfileLock for NoopProfileLock {
    async fn acquire(&self, _user_id: &str) -> AppResult<LockToken> {
        Ok(LockToken(String::new()))
    }

    async fn release(&self, _user_id: &str, _token: LockToken) -> AppResult<()> {
        Ok(())
    }
}
