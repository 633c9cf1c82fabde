use crate::api;
use crate::auth::AuthService;
use crate::cli::actions::Action;
use crate::mail::{LogMailer, Mailer, SmtpMailer};
use crate::purge::spawn_purge_worker;
use crate::session::SessionManager;
use crate::store::{postgres, PgStore};
use crate::token::TokenEngine;
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            tokens,
            mail,
            purge,
        } => {
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(&dsn)
                .await
                .context("Failed to connect to database")?;

            postgres::migrate(&pool).await?;

            let store = Arc::new(PgStore::new(pool));
            let engine = TokenEngine::new(tokens);
            let sessions = SessionManager::new(store.clone(), store.clone(), engine.clone());

            let mailer: Arc<dyn Mailer> = if mail.smtp().is_some() {
                Arc::new(SmtpMailer::new(mail)?)
            } else {
                info!("No SMTP relay configured, mail will only be logged");
                Arc::new(LogMailer::new(mail))
            };

            let service = Arc::new(AuthService::new(
                store.clone(),
                sessions,
                engine,
                mailer,
            ));

            let _purge_worker = spawn_purge_worker(store, purge);

            api::new(port, service).await?;
        }
    }

    Ok(())
}
