//! Background sweep that deletes unverified accounts.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

use crate::store::CredentialStore;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Sweep cadence and the minimum unverified age before an account is
/// eligible. The default age of zero reproduces the unconditional sweep;
/// operators can raise it to grant a signup grace period.
#[derive(Clone, Copy, Debug)]
pub struct PurgeConfig {
    interval: Duration,
    min_unverified_age: Duration,
}

impl PurgeConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            min_unverified_age: Duration::ZERO,
        }
    }

    /// A zero interval would spin the sweep loop, so it is clamped to one
    /// second.
    #[must_use]
    pub fn with_interval_seconds(mut self, seconds: u64) -> Self {
        self.interval = Duration::from_secs(seconds).max(MIN_INTERVAL);
        self
    }

    #[must_use]
    pub fn with_min_unverified_age_seconds(mut self, seconds: u64) -> Self {
        self.min_unverified_age = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn min_unverified_age(&self) -> Duration {
        self.min_unverified_age
    }
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the sweep loop. A single long-lived task; store failures are
/// logged and the loop continues, so one failed delete cannot take down a
/// live service.
pub fn spawn_purge_worker(
    store: Arc<dyn CredentialStore>,
    config: PurgeConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(config.interval()).await;
            match store.purge_unverified(config.min_unverified_age()).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "purged unverified accounts"),
                Err(err) => error!("purge sweep failed: {err}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::store::{MemoryStore, User};
    use anyhow::Result;

    #[test]
    fn purge_config_defaults_and_overrides() {
        let config = PurgeConfig::new();
        assert_eq!(config.interval(), DEFAULT_INTERVAL);
        assert_eq!(config.min_unverified_age(), Duration::ZERO);

        let config = config
            .with_interval_seconds(5)
            .with_min_unverified_age_seconds(120);
        assert_eq!(config.interval(), Duration::from_secs(5));
        assert_eq!(config.min_unverified_age(), Duration::from_secs(120));
    }

    #[test]
    fn purge_config_clamps_zero_interval() {
        let config = PurgeConfig::new().with_interval_seconds(0);
        assert_eq!(config.interval(), MIN_INTERVAL);
    }

    // Paused time: sleeps auto-advance, so the one-second interval does not
    // slow the test down.
    #[tokio::test(start_paused = true)]
    async fn worker_sweeps_unverified_accounts() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        store
            .create_user(User {
                email: "pending@x.com".to_string(),
                password_hash: hash_password("pw")?,
                role: "viewer".to_string(),
                verified: false,
            })
            .await?;
        store
            .create_user(User {
                email: "active@x.com".to_string(),
                password_hash: hash_password("pw")?,
                role: "viewer".to_string(),
                verified: true,
            })
            .await?;

        let config = PurgeConfig::new().with_interval_seconds(1);
        let worker = spawn_purge_worker(store.clone(), config);

        // Give the sweep a couple of ticks, then stop it.
        tokio::time::sleep(Duration::from_secs(3)).await;
        worker.abort();

        assert!(store.find_user("pending@x.com").await?.is_none());
        assert!(store.find_user("active@x.com").await?.is_some());
        Ok(())
    }
}
