//! In-memory store used by the lifecycle tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::{CredentialStore, Session, SessionStore, StoreError, User};
use crate::auth::password::verify_password;

struct UserEntry {
    user: User,
    created_at: Instant,
}

/// Mutex-guarded maps with the same atomicity guarantees as the Postgres
/// store: `consume` removes the session row under the lock.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, UserEntry>>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live session rows, for test assertions.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn create_user(&self, user: User) -> Result<(), StoreError> {
        let mut users = self.users.lock().await;
        if users.contains_key(&user.email) {
            return Err(StoreError(anyhow::anyhow!(
                "user already exists: {}",
                user.email
            )));
        }
        users.insert(
            user.email.clone(),
            UserEntry {
                user,
                created_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().await;
        Ok(users.get(email).map(|entry| entry.user.clone()))
    }

    async fn validate_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<String>, StoreError> {
        let users = self.users.lock().await;
        Ok(users.get(email).and_then(|entry| {
            if verify_password(&entry.user.password_hash, password) {
                Some(entry.user.role.clone())
            } else {
                None
            }
        }))
    }

    async fn mark_verified(&self, email: &str) -> Result<(), StoreError> {
        let mut users = self.users.lock().await;
        if let Some(entry) = users.get_mut(email) {
            entry.user.verified = true;
        }
        Ok(())
    }

    async fn set_password_hash(&self, email: &str, password_hash: &str) -> Result<(), StoreError> {
        let mut users = self.users.lock().await;
        if let Some(entry) = users.get_mut(email) {
            entry.user.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn purge_unverified(&self, min_age: Duration) -> Result<u64, StoreError> {
        let mut users = self.users.lock().await;
        let before = users.len();
        users.retain(|_, entry| entry.user.verified || entry.created_at.elapsed() < min_age);
        Ok((before - users.len()) as u64)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert(&self, session: Session) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(session.refresh_token.clone(), session);
        Ok(())
    }

    async fn consume(&self, refresh_token: &str) -> Result<Option<Session>, StoreError> {
        let mut sessions = self.sessions.lock().await;
        Ok(sessions.remove(refresh_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use anyhow::Result;

    fn user(email: &str, verified: bool) -> Result<User> {
        Ok(User {
            email: email.to_string(),
            password_hash: hash_password("password")?,
            role: "viewer".to_string(),
            verified,
        })
    }

    #[tokio::test]
    async fn create_user_rejects_duplicates() -> Result<()> {
        let store = MemoryStore::new();
        store.create_user(user("a@x.com", false)?).await?;
        assert!(store.create_user(user("a@x.com", false)?).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn validate_credentials_checks_hash() -> Result<()> {
        let store = MemoryStore::new();
        store.create_user(user("a@x.com", false)?).await?;

        let role = store.validate_credentials("a@x.com", "password").await?;
        assert_eq!(role.as_deref(), Some("viewer"));

        let role = store.validate_credentials("a@x.com", "wrong").await?;
        assert_eq!(role, None);

        let role = store.validate_credentials("nobody@x.com", "password").await?;
        assert_eq!(role, None);
        Ok(())
    }

    #[tokio::test]
    async fn consume_is_single_use() -> Result<()> {
        let store = MemoryStore::new();
        store
            .insert(Session {
                refresh_token: "rt-1".to_string(),
                user_email: "a@x.com".to_string(),
                device_id: "dev1".to_string(),
            })
            .await?;

        let first = store.consume("rt-1").await?;
        assert_eq!(first.map(|s| s.device_id), Some("dev1".to_string()));
        assert_eq!(store.consume("rt-1").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn purge_removes_only_aged_unverified_users() -> Result<()> {
        let store = MemoryStore::new();
        store.create_user(user("fresh@x.com", false)?).await?;
        store.create_user(user("done@x.com", true)?).await?;

        // A large grace period keeps the fresh unverified account alive.
        let removed = store.purge_unverified(Duration::from_secs(3600)).await?;
        assert_eq!(removed, 0);

        // Zero grace period reproduces the unconditional sweep.
        let removed = store.purge_unverified(Duration::ZERO).await?;
        assert_eq!(removed, 1);
        assert!(store.find_user("fresh@x.com").await?.is_none());
        assert!(store.find_user("done@x.com").await?.is_some());
        Ok(())
    }
}
