//! Outbound mail for verification and password-reset links.
//!
//! Delivery is fire-and-fail-loud: no retry, no queue. The `Mailer` trait
//! keeps the transport swappable; `LogMailer` is the default for local dev
//! and tests, `SmtpMailer` delivers over an authenticated SMTP relay.

use anyhow::{Context, Result, anyhow};
use lettre::{
    Message, SmtpTransport, Transport,
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::info;
use url::Url;

/// Delivery failure. Reported to the caller, never retried or queued.
#[derive(Debug, Error)]
#[error("mail delivery failed: {0}")]
pub struct MailError(#[from] anyhow::Error);

/// Outbound mail settings: the public base URL used to build links, plus
/// optional SMTP relay credentials. Without relay settings the service
/// falls back to the log-only mailer.
#[derive(Clone, Debug)]
pub struct MailConfig {
    base_url: String,
    smtp: Option<SmtpConfig>,
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub relay: String,
    pub username: String,
    pub password: SecretString,
    pub from: String,
}

impl MailConfig {
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL.
    pub fn new(base_url: &str) -> Result<Self> {
        Url::parse(base_url).with_context(|| format!("invalid base URL: {base_url}"))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            smtp: None,
        })
    }

    #[must_use]
    pub fn with_smtp(mut self, smtp: SmtpConfig) -> Self {
        self.smtp = Some(smtp);
        self
    }

    #[must_use]
    pub fn smtp(&self) -> Option<&SmtpConfig> {
        self.smtp.as_ref()
    }

    fn verify_link(&self, token: &str) -> String {
        format!("{}/auth/verify-email?token={token}", self.base_url)
    }

    fn reset_link(&self, token: &str) -> String {
        format!("{}/auth/confirm-password?token={token}", self.base_url)
    }
}

pub trait Mailer: Send + Sync {
    /// Send the email-verification link.
    ///
    /// # Errors
    ///
    /// Returns `MailError` if delivery fails.
    fn send_verification(&self, email: &str, token: &str) -> Result<(), MailError>;

    /// Send the password-reset confirmation link.
    ///
    /// # Errors
    ///
    /// Returns `MailError` if delivery fails.
    fn send_password_reset(&self, email: &str, token: &str) -> Result<(), MailError>;
}

/// Local dev mailer that logs the link instead of sending real email.
pub struct LogMailer {
    config: MailConfig,
}

impl LogMailer {
    #[must_use]
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }
}

impl Mailer for LogMailer {
    fn send_verification(&self, email: &str, token: &str) -> Result<(), MailError> {
        info!(
            to_email = %email,
            link = %self.config.verify_link(token),
            "verification mail send stub"
        );
        Ok(())
    }

    fn send_password_reset(&self, email: &str, token: &str) -> Result<(), MailError> {
        info!(
            to_email = %email,
            link = %self.config.reset_link(token),
            "password-reset mail send stub"
        );
        Ok(())
    }
}

/// Delivers over an authenticated SMTP relay.
pub struct SmtpMailer {
    config: MailConfig,
    from: String,
    transport: SmtpTransport,
}

impl SmtpMailer {
    /// # Errors
    ///
    /// Returns an error if the config carries no SMTP settings or the relay
    /// transport cannot be built.
    pub fn new(config: MailConfig) -> Result<Self> {
        let smtp = config
            .smtp()
            .cloned()
            .ok_or_else(|| anyhow!("missing SMTP relay settings"))?;

        let transport = SmtpTransport::relay(&smtp.relay)
            .with_context(|| format!("failed to build SMTP transport for {}", smtp.relay))?
            .credentials(Credentials::new(
                smtp.username.clone(),
                smtp.password.expose_secret().to_string(),
            ))
            .build();

        Ok(Self {
            config,
            from: smtp.from,
            transport,
        })
    }

    fn send(&self, to_email: &str, subject: &str, body: String) -> Result<(), MailError> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .with_context(|| format!("invalid from address: {}", self.from))?,
            )
            .to(to_email
                .parse()
                .with_context(|| format!("invalid to address: {to_email}"))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .context("failed to build mail message")?;

        self.transport
            .send(&message)
            .map(|_| ())
            .context("failed to send mail")
            .map_err(MailError)
    }
}

impl Mailer for SmtpMailer {
    fn send_verification(&self, email: &str, token: &str) -> Result<(), MailError> {
        let link = self.config.verify_link(token);
        self.send(
            email,
            "Verify your email",
            format!("Click on the link to confirm your email\n{link}\n"),
        )
    }

    fn send_password_reset(&self, email: &str, token: &str) -> Result<(), MailError> {
        let link = self.config.reset_link(token);
        self.send(
            email,
            "Confirm your new password",
            format!("Click on the link to confirm your new password\n{link}\n"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mail_config_rejects_invalid_base_url() {
        assert!(MailConfig::new("not a url").is_err());
    }

    #[test]
    fn links_trim_trailing_slash() -> Result<()> {
        let config = MailConfig::new("https://auth.example.com/")?;
        assert_eq!(
            config.verify_link("tok"),
            "https://auth.example.com/auth/verify-email?token=tok"
        );
        assert_eq!(
            config.reset_link("tok"),
            "https://auth.example.com/auth/confirm-password?token=tok"
        );
        Ok(())
    }

    #[test]
    fn smtp_mailer_requires_relay_settings() -> Result<()> {
        let config = MailConfig::new("https://auth.example.com")?;
        assert!(SmtpMailer::new(config).is_err());
        Ok(())
    }

    #[test]
    fn log_mailer_always_delivers() -> Result<()> {
        let mailer = LogMailer::new(MailConfig::new("https://auth.example.com")?);
        mailer.send_verification("a@x.com", "tok")?;
        mailer.send_password_reset("a@x.com", "tok")?;
        Ok(())
    }
}
