//! Use-case composition over the store, session manager, token engine, and
//! mailer collaborators.

use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use crate::mail::{MailError, Mailer};
use crate::session::{SessionError, SessionManager, TokenPair};
use crate::store::{CredentialStore, StoreError, User};
use crate::token::{Claims, TokenEngine, TokenError};

pub mod password;

use password::hash_password;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("could not create the user")]
    CreateFailed(#[source] StoreError),
    #[error("could not send the mail")]
    MailFailed(#[from] MailError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

/// Implements the eight use-cases: signup, login, logout, token
/// replacement, email verification, password reset request/confirmation,
/// and verification resend.
pub struct AuthService {
    users: Arc<dyn CredentialStore>,
    sessions: SessionManager,
    tokens: TokenEngine,
    mailer: Arc<dyn Mailer>,
}

impl AuthService {
    #[must_use]
    pub fn new(
        users: Arc<dyn CredentialStore>,
        sessions: SessionManager,
        tokens: TokenEngine,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            users,
            sessions,
            tokens,
            mailer,
        }
    }

    /// Create an unverified user and send the verification link.
    ///
    /// # Errors
    ///
    /// `CreateFailed` if the user cannot be persisted (including duplicate
    /// emails), `MailFailed` if the verification mail cannot be delivered.
    #[instrument(skip(self, password))]
    pub async fn signup(&self, email: &str, password: &str, role: &str) -> Result<(), AuthError> {
        let password_hash = hash_password(password)?;
        self.users
            .create_user(User {
                email: email.to_string(),
                password_hash,
                role: role.to_string(),
                verified: false,
            })
            .await
            .map_err(AuthError::CreateFailed)?;

        let token = self.tokens.verify_email_token(email)?;
        self.mailer.send_verification(email, &token)?;
        Ok(())
    }

    /// Validate credentials and open a session for the device.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for unknown users or mismatched passwords,
    /// `Session` if the session cannot be opened.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device_id: &str,
    ) -> Result<TokenPair, AuthError> {
        let role = self
            .users
            .validate_credentials(email, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        Ok(self.sessions.open(email, &role, device_id).await?)
    }

    /// Close the session identified by this refresh token.
    ///
    /// # Errors
    ///
    /// `Session(NotFound)` for unknown or already-consumed tokens.
    #[instrument(skip(self, refresh_token))]
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        Ok(self.sessions.close(refresh_token).await?)
    }

    /// Rotate a refresh token into a new access/refresh pair.
    ///
    /// # Errors
    ///
    /// `Session(NotFound | DeviceMismatch | UserNotFound)` per the rotation
    /// protocol.
    #[instrument(skip(self, refresh_token))]
    pub async fn replace_tokens(
        &self,
        refresh_token: &str,
        device_id: &str,
    ) -> Result<TokenPair, AuthError> {
        Ok(self.sessions.rotate(refresh_token, device_id).await?)
    }

    /// Consume a verification token and mark the user verified. Verifying
    /// an already-verified email is harmless, so the token is not tracked
    /// as single-use.
    ///
    /// # Errors
    ///
    /// `Token(Expired | Malformed | EmptyToken)` for bad tokens.
    #[instrument(skip(self, token))]
    pub async fn verify_email(&self, token: &str) -> Result<(), AuthError> {
        let Claims::VerifyEmail { email, .. } = self.tokens.verify(token)? else {
            return Err(AuthError::Token(TokenError::Malformed));
        };
        Ok(self.users.mark_verified(&email).await?)
    }

    /// Issue a password-reset token embedding the hash of the new password
    /// and mail the confirmation link.
    ///
    /// # Errors
    ///
    /// `MailFailed` if the reset mail cannot be delivered.
    #[instrument(skip(self, new_password))]
    pub async fn request_password_reset(
        &self,
        email: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let hashed_password = hash_password(new_password)?;
        let token = self.tokens.password_reset_token(email, &hashed_password)?;
        self.mailer.send_password_reset(email, &token)?;
        Ok(())
    }

    /// Consume a password-reset token and write the embedded hash. Resetting
    /// to the same password twice is harmless; only expiry limits the token.
    ///
    /// # Errors
    ///
    /// `Token(Expired | Malformed | EmptyToken)` for bad tokens.
    #[instrument(skip(self, token))]
    pub async fn confirm_password_reset(&self, token: &str) -> Result<(), AuthError> {
        let Claims::PasswordReset {
            email,
            hashed_password,
            ..
        } = self.tokens.verify(token)?
        else {
            return Err(AuthError::Token(TokenError::Malformed));
        };
        Ok(self.users.set_password_hash(&email, &hashed_password).await?)
    }

    /// Re-issue the verification token and resend the mail.
    ///
    /// # Errors
    ///
    /// `MailFailed` if the verification mail cannot be delivered.
    #[instrument(skip(self))]
    pub async fn resend_verification(&self, email: &str) -> Result<(), AuthError> {
        let token = self.tokens.verify_email_token(email)?;
        self.mailer.send_verification(email, &token)?;
        Ok(())
    }
}
