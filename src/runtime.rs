//! Runtime harness for Fulmen
//!
//! Wires configuration into the shared account state, the HTTP client and
//! the pollers, then drives each poller on its own task. This is the thin
//! hosting layer; all polling behavior lives in [`crate::poller`].

use crate::api::{ApiClient, ReqwestTransport, Transport};
use crate::config::Config;
use crate::credentials::FileCredentialStore;
use crate::error::Result;
use crate::logging::{LogContext, get_logger, get_logger_with_context};
use crate::model::SensorSnapshot;
use crate::poller::Poller;
use crate::token::{Account, TokenManager};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Assembled application state
pub struct Runtime {
    config: Config,
    account: Arc<Account>,
    api: Arc<ApiClient>,
    logger: crate::logging::StructuredLogger,
}

impl Runtime {
    /// Build the shared state from a validated configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(FileCredentialStore::new(&config.credentials_file));
        let account = Arc::new(Account::new(store)?);
        let transport: Arc<dyn Transport> =
            Arc::new(ReqwestTransport::with_user_agent(&config.http.user_agent)?);
        let api = Arc::new(ApiClient::new(
            transport,
            account.clone(),
            Duration::from_secs(config.http.timeout_seconds),
        ));
        let logger = get_logger("runtime");

        Ok(Self {
            config,
            account,
            api,
            logger,
        })
    }

    /// Token manager bound to this runtime's account
    pub fn token_manager(&self) -> TokenManager {
        TokenManager::new(self.account.clone())
    }

    /// Shared API client
    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    /// Spawn all configured pollers and run until ctrl-c
    pub async fn run(&self) -> Result<()> {
        for poller_config in self.config.poller_configs()? {
            let name = poller_config.name.clone();
            let (poller, snapshot_rx) =
                Poller::new(poller_config, self.account.clone(), self.api.clone());

            tokio::spawn(poller.run());
            tokio::spawn(log_snapshots(name, snapshot_rx));
        }

        self.logger.info("Fulmen running; press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
        self.logger.info("Shutdown requested, stopping pollers");

        Ok(())
    }
}

/// Surface published snapshot transitions in the log
async fn log_snapshots(name: String, mut snapshot_rx: watch::Receiver<SensorSnapshot>) {
    let logger = get_logger_with_context(LogContext::new("sensor").with_sensor(name));

    while snapshot_rx.changed().await.is_ok() {
        let snapshot = snapshot_rx.borrow().clone();
        match (snapshot.reading_kwh, &snapshot.error) {
            (_, Some(error)) => logger.warn(&format!("Update failed: {}", error)),
            (Some(kwh), None) => logger.info(&format!(
                "Reading {} kWh ({})",
                kwh,
                snapshot.state_data_type.map_or("UNSET", |c| c.as_str())
            )),
            _ => logger.debug("No reading available yet"),
        }
    }
}
