//! Signed, time-bounded claims for the four token purposes.
//!
//! Tokens are self-contained HS256 JWTs: verification never touches the
//! store, which keeps the access-token check cheap on the hot request path.
//! Revocability for refresh tokens comes from the session table, not from
//! the token itself.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_ALG: &str = "HS256";

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_VERIFY_EMAIL_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_PASSWORD_RESET_TTL_SECONDS: i64 = 15 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: TOKEN_ALG.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claims payload, one variant per token purpose.
///
/// `expire` is an absolute unix timestamp computed at issuance from the
/// per-kind TTL; verification uses only this embedded claim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Claims {
    Access {
        email: String,
        role: String,
        expire: i64,
    },
    Refresh {
        expire: i64,
    },
    VerifyEmail {
        email: String,
        expire: i64,
    },
    PasswordReset {
        email: String,
        hashed_password: String,
        expire: i64,
    },
}

impl Claims {
    #[must_use]
    pub fn expire(&self) -> i64 {
        match self {
            Self::Access { expire, .. }
            | Self::Refresh { expire }
            | Self::VerifyEmail { expire, .. }
            | Self::PasswordReset { expire, .. } => *expire,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("empty token")]
    EmptyToken,
    #[error("malformed token")]
    Malformed,
    #[error("token expired")]
    Expired,
    #[error("failed to sign claims")]
    Signing,
}

/// Per-kind TTLs and the symmetric signing secret, configured once at
/// process start and passed into the engine at construction.
#[derive(Clone, Debug)]
pub struct TokenConfig {
    secret: SecretString,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    verify_email_ttl_seconds: i64,
    password_reset_ttl_seconds: i64,
}

impl TokenConfig {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            verify_email_ttl_seconds: DEFAULT_VERIFY_EMAIL_TTL_SECONDS,
            password_reset_ttl_seconds: DEFAULT_PASSWORD_RESET_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_verify_email_ttl_seconds(mut self, seconds: i64) -> Self {
        self.verify_email_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_password_reset_ttl_seconds(mut self, seconds: i64) -> Self {
        self.password_reset_ttl_seconds = seconds;
        self
    }
}

/// Issues and verifies signed claims. Pure aside from reading the secret
/// and the clock; `verify_at` takes the clock explicitly for tests.
#[derive(Clone, Debug)]
pub struct TokenEngine {
    config: TokenConfig,
}

impl TokenEngine {
    #[must_use]
    pub fn new(config: TokenConfig) -> Self {
        Self { config }
    }

    /// Issue an access token authorizing API calls for (email, role).
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the claims cannot be serialized.
    pub fn access_token(&self, email: &str, role: &str) -> Result<String, TokenError> {
        self.sign(&Claims::Access {
            email: email.to_string(),
            role: role.to_string(),
            expire: unix_now() + self.config.access_ttl_seconds,
        })
    }

    /// Issue a refresh token; it carries no claims beyond its expiry and
    /// pairs with a session row for revocability.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the claims cannot be serialized.
    pub fn refresh_token(&self) -> Result<String, TokenError> {
        self.sign(&Claims::Refresh {
            expire: unix_now() + self.config.refresh_ttl_seconds,
        })
    }

    /// Issue a token proving control of the mailbox for email verification.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the claims cannot be serialized.
    pub fn verify_email_token(&self, email: &str) -> Result<String, TokenError> {
        self.sign(&Claims::VerifyEmail {
            email: email.to_string(),
            expire: unix_now() + self.config.verify_email_ttl_seconds,
        })
    }

    /// Issue a password-reset token carrying the pending password hash.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the claims cannot be serialized.
    pub fn password_reset_token(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> Result<String, TokenError> {
        self.sign(&Claims::PasswordReset {
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
            expire: unix_now() + self.config.password_reset_ttl_seconds,
        })
    }

    /// Verify a token against the current clock.
    ///
    /// # Errors
    ///
    /// See [`TokenEngine::verify_at`].
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, unix_now())
    }

    /// Verify a token at an explicit check time and return its typed claims.
    ///
    /// # Errors
    ///
    /// - `EmptyToken` for empty input,
    /// - `Malformed` for unparseable tokens, invalid signatures, or any
    ///   declared algorithm other than HS256 (downgrade rejection),
    /// - `Expired` once `now` passes the embedded expiry.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        if token.is_empty() {
            return Err(TokenError::EmptyToken);
        }

        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(TokenError::Malformed)?;
        let claims_b64 = parts.next().ok_or(TokenError::Malformed)?;
        let sig_b64 = parts.next().ok_or(TokenError::Malformed)?;
        if parts.next().is_some() {
            return Err(TokenError::Malformed);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != TOKEN_ALG {
            return Err(TokenError::Malformed);
        }

        let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Malformed)?;
        let mut mac = HmacSha256::new_from_slice(self.config.secret.expose_secret().as_bytes())
            .map_err(|_| TokenError::Malformed)?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::Malformed)?;

        let claims: Claims = b64d_json(claims_b64)?;
        if now > claims.expire() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let header_b64 = b64e_json(&TokenHeader::hs256())?;
        let claims_b64 = b64e_json(claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let mut mac = HmacSha256::new_from_slice(self.config.secret.expose_secret().as_bytes())
            .map_err(|_| TokenError::Signing)?;
        mac.update(signing_input.as_bytes());
        let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature_b64}"))
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value).map_err(|_| TokenError::Signing)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}
