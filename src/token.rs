//! Shared account state and token lifecycle
//!
//! One [`Account`] exists per logical CLP account and is shared by reference
//! among all pollers. Token reads and writes go through a plain mutex that is
//! never held across an await; the refresh critical section is serialized by
//! a separate async lock so concurrent pollers cannot trigger refresh storms.

use crate::api::{ApiClient, OTP_VERIFY_URL, REFRESH_TOKEN_URL};
use crate::credentials::{CredentialStore, Credentials};
use crate::dates;
use crate::error::{FulmenError, Result};
use crate::logging::get_logger;
use crate::payload::{OtpTokenPayload, TokenPayload};
use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde_json::json;
use std::sync::Mutex as StdMutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Shared per-account state: the token triple, the account number, and the
/// client-error counter
pub struct Account {
    state: StdMutex<Credentials>,
    refresh_lock: tokio::sync::Mutex<()>,
    client_errors: AtomicU32,
    store: Arc<dyn CredentialStore>,
    logger: crate::logging::StructuredLogger,
}

impl Account {
    /// Create the account state, loading any persisted credentials
    pub fn new(store: Arc<dyn CredentialStore>) -> Result<Self> {
        let logger = get_logger("account");
        let credentials = store.load()?;

        Ok(Self {
            state: StdMutex::new(credentials),
            refresh_lock: tokio::sync::Mutex::new(()),
            client_errors: AtomicU32::new(0),
            store,
            logger,
        })
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, Credentials> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current access token, if any
    pub fn access_token(&self) -> Option<String> {
        self.locked().access_token.clone()
    }

    /// Current refresh token, if any
    pub fn refresh_token(&self) -> Option<String> {
        self.locked().refresh_token.clone()
    }

    /// Stored account number, if already discovered
    pub fn account_number(&self) -> Option<String> {
        self.locked().account_number.clone()
    }

    /// Snapshot of the full credential state
    pub fn credentials(&self) -> Credentials {
        self.locked().clone()
    }

    /// Replace the whole credential state and persist it
    pub fn set_credentials(&self, credentials: Credentials) -> Result<()> {
        *self.locked() = credentials.clone();
        self.store.save(&credentials)
    }

    /// Replace the token triple, keep the account number, persist
    pub fn replace_tokens(
        &self,
        access_token: String,
        refresh_token: String,
        expiry: String,
    ) -> Result<()> {
        let updated = {
            let mut state = self.locked();
            state.access_token = Some(access_token);
            state.refresh_token = Some(refresh_token);
            state.expiry = Some(expiry);
            state.clone()
        };
        self.store.save(&updated)
    }

    /// Record the discovered account number and persist it
    pub fn set_account_number(&self, account_number: Option<String>) -> Result<()> {
        let updated = {
            let mut state = self.locked();
            state.account_number = account_number;
            state.clone()
        };
        self.store.save(&updated)
    }

    /// Drop every stored credential from memory.
    ///
    /// The durable store is left untouched, matching a session invalidation
    /// rather than an unlink: a restart may retry with the persisted tokens.
    pub fn clear_credentials(&self) {
        let mut state = self.locked();
        state.access_token = None;
        state.refresh_token = None;
        state.expiry = None;
        state.account_number = None;
        self.logger.warn("Cleared stored credentials");
    }

    /// Count one client-error response; returns the new total
    pub fn record_client_error(&self) -> u32 {
        self.client_errors.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Client errors recorded so far (never reset within the process)
    pub fn client_error_count(&self) -> u32 {
        self.client_errors.load(Ordering::SeqCst)
    }
}

/// Manages refresh of the shared token pair
pub struct TokenManager {
    account: Arc<Account>,
    logger: crate::logging::StructuredLogger,
}

impl TokenManager {
    /// Create a manager for the shared account
    pub fn new(account: Arc<Account>) -> Self {
        let logger = get_logger("token");
        Self { account, logger }
    }

    /// Whether a refresh is due: no expiry recorded, or the current time is
    /// within one minute of it
    pub fn refresh_due(expiry: Option<&str>, now: DateTime<Utc>) -> Result<bool> {
        match expiry {
            None => Ok(true),
            Some(raw) => {
                let expiry = dates::parse_expiry(raw)?;
                Ok(now > expiry - Duration::minutes(1))
            }
        }
    }

    /// Refresh the token pair if due, serialized across all pollers.
    ///
    /// With no stored refresh token this is a no-op; the caller notices the
    /// missing access token and skips its cycle. On refresh failure the
    /// stored tokens are left untouched and the error propagates.
    pub async fn ensure_fresh(&self, api: &ApiClient) -> Result<()> {
        let _guard = self.account.refresh_lock.lock().await;

        let credentials = self.account.credentials();
        let Some(refresh_token) = credentials.refresh_token else {
            return Ok(());
        };

        if !Self::refresh_due(credentials.expiry.as_deref(), Utc::now())? {
            return Ok(());
        }

        self.logger.debug("Refreshing access_token and refresh_token");
        let data = api
            .request(
                Method::POST,
                REFRESH_TOKEN_URL,
                Some(json!({ "refreshToken": refresh_token })),
                Vec::new(),
            )
            .await?;

        let payload: TokenPayload = serde_json::from_value(data)
            .map_err(|e| FulmenError::parse(format!("unexpected refresh payload: {}", e)))?;

        self.account
            .replace_tokens(payload.access_token, payload.refresh_token, payload.expires_in)?;
        self.logger.debug("Token pair refreshed and persisted");

        Ok(())
    }

    /// Exchange a one-time password for the initial token triple and persist
    /// it (account linking)
    pub async fn verify_otp(&self, api: &ApiClient, email: &str, otp: &str) -> Result<()> {
        let data = api
            .request(
                Method::POST,
                OTP_VERIFY_URL,
                Some(json!({ "type": "email", "email": email, "otp": otp })),
                Vec::new(),
            )
            .await?;

        let payload: OtpTokenPayload = serde_json::from_value(data)
            .map_err(|e| FulmenError::parse(format!("unexpected OTP payload: {}", e)))?;

        if payload.access_token.is_none() {
            return Err(FulmenError::auth("OTP verification returned no tokens"));
        }

        self.account.set_credentials(Credentials {
            access_token: payload.access_token,
            refresh_token: payload.refresh_token,
            expiry: payload.expiry,
            account_number: None,
        })?;
        self.logger.info("Account linked, credentials persisted");

        Ok(())
    }
}
