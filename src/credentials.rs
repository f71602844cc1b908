//! Durable credential storage
//!
//! The token triple and account number must survive process restarts. This
//! module provides the storage seam and the default JSON-file-backed store.

use crate::error::Result;
use crate::logging::get_logger;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Persisted credential state
///
/// The expiry is kept as the raw string supplied by the provider and parsed
/// at comparison time, so a format change surfaces as a per-call error
/// rather than corrupting the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expiry: Option<String>,
    pub account_number: Option<String>,
}

impl Credentials {
    /// Whether nothing usable is stored
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Storage seam for the credential triple
pub trait CredentialStore: Send + Sync {
    /// Load persisted credentials; a missing store yields the empty default
    fn load(&self) -> Result<Credentials>;

    /// Replace the persisted credentials
    fn save(&self, credentials: &Credentials) -> Result<()>;
}

/// JSON-file-backed credential store
pub struct FileCredentialStore {
    file_path: String,
    logger: crate::logging::StructuredLogger,
}

impl FileCredentialStore {
    /// Create a store backed by the given file path
    pub fn new(file_path: &str) -> Self {
        let logger = get_logger("credentials");
        Self {
            file_path: file_path.to_string(),
            logger,
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Credentials> {
        let path = Path::new(&self.file_path);

        if !path.exists() {
            self.logger
                .info("No credential file found, starting unlinked");
            return Ok(Credentials::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let credentials = serde_json::from_str(&contents)?;
        self.logger.info("Loaded credentials from disk");

        Ok(credentials)
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        let contents = serde_json::to_string_pretty(credentials)?;
        std::fs::write(&self.file_path, contents)?;
        self.logger.debug("Saved credentials to disk");

        Ok(())
    }
}
