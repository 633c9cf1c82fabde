//! Postgres-backed credential and session store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::Instrument;

use super::{CredentialStore, Session, SessionStore, StoreError, User};
use crate::auth::password::verify_password;

/// Implements both store traits over a shared connection pool.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Create the users and sessions relations if they do not exist yet.
///
/// # Errors
///
/// Returns an error if either DDL statement fails.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    let query = r"
        CREATE TABLE IF NOT EXISTS users (
            email TEXT PRIMARY KEY,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL,
            verified BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
    ";
    sqlx::query(query)
        .execute(pool)
        .await
        .context("failed to create users table")?;

    let query = r"
        CREATE TABLE IF NOT EXISTS sessions (
            refresh_token TEXT PRIMARY KEY,
            user_email TEXT NOT NULL REFERENCES users (email) ON DELETE CASCADE,
            device_id TEXT NOT NULL
        )
    ";
    sqlx::query(query)
        .execute(pool)
        .await
        .context("failed to create sessions table")?;

    Ok(())
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn create_user(&self, user: User) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO users (email, password_hash, role)
            VALUES ($1, $2, $3)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.role)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert user")?;
        Ok(())
    }

    async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        let query = r"
            SELECT email, password_hash, role, verified
            FROM users
            WHERE email = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user")?;

        Ok(row.map(|row| User {
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            role: row.get("role"),
            verified: row.get("verified"),
        }))
    }

    async fn validate_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<String>, StoreError> {
        let query = r"
            SELECT password_hash, role
            FROM users
            WHERE email = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup credentials")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let password_hash: String = row.get("password_hash");
        if verify_password(&password_hash, password) {
            Ok(Some(row.get("role")))
        } else {
            Ok(None)
        }
    }

    async fn mark_verified(&self, email: &str) -> Result<(), StoreError> {
        let query = "UPDATE users SET verified = TRUE WHERE email = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(email)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to mark user verified")?;
        Ok(())
    }

    async fn set_password_hash(&self, email: &str, password_hash: &str) -> Result<(), StoreError> {
        let query = "UPDATE users SET password_hash = $1 WHERE email = $2";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(password_hash)
            .bind(email)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to set password hash")?;
        Ok(())
    }

    async fn purge_unverified(&self, min_age: Duration) -> Result<u64, StoreError> {
        let query = r"
            DELETE FROM users
            WHERE verified = FALSE
              AND created_at <= NOW() - ($1 * INTERVAL '1 second')
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let min_age_seconds = i64::try_from(min_age.as_secs()).unwrap_or(i64::MAX);
        let result = sqlx::query(query)
            .bind(min_age_seconds)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to purge unverified users")?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert(&self, session: Session) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO sessions (refresh_token, user_email, device_id)
            VALUES ($1, $2, $3)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&session.refresh_token)
            .bind(&session.user_email)
            .bind(&session.device_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert session")?;
        Ok(())
    }

    async fn consume(&self, refresh_token: &str) -> Result<Option<Session>, StoreError> {
        // Single atomic lookup-then-delete: concurrent rotations of the same
        // token see exactly one row here.
        let query = r"
            DELETE FROM sessions
            WHERE refresh_token = $1
            RETURNING refresh_token, user_email, device_id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(refresh_token)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to consume session")?;

        Ok(row.map(|row| Session {
            refresh_token: row.get("refresh_token"),
            user_email: row.get("user_email"),
            device_id: row.get("device_id"),
        }))
    }
}
