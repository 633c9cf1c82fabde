use crate::cli::actions::Action;
use crate::mail::{MailConfig, SmtpConfig};
use crate::purge::PurgeConfig;
use crate::token::TokenConfig;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let secret = matches
        .get_one::<String>("secret-key")
        .cloned()
        .context("missing required argument: --secret-key")?;

    let mut tokens = TokenConfig::new(SecretString::from(secret));
    if let Some(seconds) = matches.get_one::<i64>("access-ttl") {
        tokens = tokens.with_access_ttl_seconds(*seconds);
    }
    if let Some(seconds) = matches.get_one::<i64>("refresh-ttl") {
        tokens = tokens.with_refresh_ttl_seconds(*seconds);
    }
    if let Some(seconds) = matches.get_one::<i64>("verify-email-ttl") {
        tokens = tokens.with_verify_email_ttl_seconds(*seconds);
    }
    if let Some(seconds) = matches.get_one::<i64>("password-reset-ttl") {
        tokens = tokens.with_password_reset_ttl_seconds(*seconds);
    }

    let base_url = matches
        .get_one::<String>("base-url")
        .cloned()
        .context("missing required argument: --base-url")?;
    let mut mail = MailConfig::new(&base_url)?;
    if let Some(relay) = matches.get_one::<String>("smtp-relay") {
        mail = mail.with_smtp(SmtpConfig {
            relay: relay.clone(),
            username: matches
                .get_one::<String>("smtp-username")
                .cloned()
                .unwrap_or_default(),
            password: SecretString::from(
                matches
                    .get_one::<String>("smtp-password")
                    .cloned()
                    .unwrap_or_default(),
            ),
            from: matches
                .get_one::<String>("mail-from")
                .cloned()
                .unwrap_or_else(|| "no-reply@localhost".to_string()),
        });
    }

    let mut purge = PurgeConfig::new();
    if let Some(seconds) = matches.get_one::<u64>("purge-interval") {
        purge = purge.with_interval_seconds(*seconds);
    }
    if let Some(seconds) = matches.get_one::<u64>("purge-min-age") {
        purge = purge.with_min_unverified_age_seconds(*seconds);
    }

    Ok(Action::Server {
        port,
        dsn,
        tokens,
        mail,
        purge,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use std::time::Duration;

    #[test]
    fn handler_builds_server_action() -> Result<()> {
        let matches = commands::new().try_get_matches_from(vec![
            "tessera",
            "--dsn",
            "postgres://localhost/tessera",
            "--secret-key",
            "sikrit",
            "--port",
            "9000",
            "--purge-interval",
            "60",
            "--purge-min-age",
            "300",
        ])?;

        let Action::Server {
            port, dsn, purge, ..
        } = handler(&matches)?;
        assert_eq!(port, 9000);
        assert_eq!(dsn, "postgres://localhost/tessera");
        assert_eq!(purge.interval(), Duration::from_secs(60));
        assert_eq!(purge.min_unverified_age(), Duration::from_secs(300));
        Ok(())
    }

    #[test]
    fn handler_rejects_bad_base_url() -> Result<()> {
        let matches = commands::new().try_get_matches_from(vec![
            "tessera",
            "--dsn",
            "postgres://localhost/tessera",
            "--secret-key",
            "sikrit",
            "--base-url",
            "not a url",
        ])?;

        assert!(handler(&matches).is_err());
        Ok(())
    }
}
