//! Persistence capability traits for users and sessions.
//!
//! The Postgres implementation backs the running service; the in-memory one
//! backs the lifecycle tests. Exclusivity of refresh tokens is enforced
//! here: `SessionStore::consume` must be a single atomic lookup-then-delete.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistence layer unavailable or inconsistent. Surfaced as 500-class,
/// never retried internally.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct StoreError(#[from] anyhow::Error);

/// User identity row. Created unverified on signup; deleted only by the
/// purge sweep while unverified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub verified: bool,
}

/// A live refresh token bound to a (user, device) pair. A row exists if and
/// only if the refresh token has not been consumed by rotation or logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub refresh_token: String,
    pub user_email: String,
    pub device_id: String,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new, unverified user.
    async fn create_user(&self, user: User) -> Result<(), StoreError>;

    /// Look up a user by email.
    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Compare a password against the stored hash; returns the role on
    /// success, `None` for unknown users or mismatched passwords.
    async fn validate_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<String>, StoreError>;

    /// Flip the email-verified flag.
    async fn mark_verified(&self, email: &str) -> Result<(), StoreError>;

    /// Replace the stored password hash.
    async fn set_password_hash(&self, email: &str, password_hash: &str) -> Result<(), StoreError>;

    /// Delete unverified users older than `min_age`; returns the number of
    /// rows removed.
    async fn purge_unverified(&self, min_age: Duration) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session row keyed by its refresh token.
    async fn insert(&self, session: Session) -> Result<(), StoreError>;

    /// Atomically remove and return the session for this refresh token.
    /// Two concurrent calls on the same token see exactly one `Some`.
    async fn consume(&self, refresh_token: &str) -> Result<Option<Session>, StoreError>;
}
