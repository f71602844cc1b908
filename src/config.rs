//! Configuration management for Fulmen
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files.

use crate::error::{FulmenError, Result};
use crate::model::{EnergyCategory, SensorKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// HTTP client configuration
    pub http: HttpConfig,

    /// Path of the durable credential store
    pub credentials_file: String,

    /// Minimum interval between poll cycles in seconds (throttle)
    pub update_interval_seconds: u64,

    /// Base retry delay in seconds (exponential backoff floor)
    pub retry_delay_seconds: u64,

    /// Grid consumption sensor
    pub primary: PrimarySensorConfig,

    /// Renewable feed-in sensor
    pub renewable: RenewableSensorConfig,
}

/// HTTP client parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,

    /// User-Agent header presented to the provider
    pub user_agent: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console-specific level override
    pub console_level: Option<String>,

    /// Optional file-specific level override
    pub file_level: Option<String>,

    /// Path to log file (or directory for rotated files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Grid consumption sensor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimarySensorConfig {
    /// Display name
    pub name: String,

    /// Pins which category's value becomes the published reading;
    /// empty adopts the first category that produces one
    pub pinned_category: String,

    /// Fetch the account balance summary
    pub fetch_account: bool,

    /// Fetch bill/payment transaction history
    pub fetch_bill: bool,

    /// Fetch the current-period usage estimation
    pub fetch_estimation: bool,

    /// Fetch bimonthly bill-period consumption
    pub fetch_bimonthly: bool,

    /// Fetch daily consumption
    pub fetch_daily: bool,

    /// Fetch hourly consumption
    pub fetch_hourly: bool,

    /// Hourly lookback window in days (1-2)
    pub hourly_days: u32,
}

/// Renewable feed-in sensor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenewableSensorConfig {
    /// Whether the renewable sensor is registered at all
    pub enabled: bool,

    /// Display name
    pub name: String,

    /// Pinned category, as for the primary sensor
    pub pinned_category: String,

    /// Fetch feed-in bill periods
    pub fetch_bill: bool,

    /// Fetch daily feed-in data
    pub fetch_daily: bool,

    /// Fetch hourly feed-in data
    pub fetch_hourly: bool,

    /// Hourly lookback window in days (1-2)
    pub hourly_days: u32,
}

/// Immutable per-sensor configuration handed to a poller
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub kind: SensorKind,
    pub name: String,
    pub timeout: Duration,
    pub update_interval: Duration,
    pub retry_delay: Duration,
    pub pinned_category: Option<EnergyCategory>,
    pub fetch_account: bool,
    pub fetch_bill: bool,
    pub fetch_estimation: bool,
    pub fetch_bimonthly: bool,
    pub fetch_daily: bool,
    pub fetch_hourly: bool,
    pub hourly_days: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            http: HttpConfig::default(),
            credentials_file: "/data/fulmen_credentials.json".to_string(),
            update_interval_seconds: 300,
            retry_delay_seconds: 300,
            primary: PrimarySensorConfig::default(),
            renewable: RenewableSensorConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/fulmen.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for PrimarySensorConfig {
    fn default() -> Self {
        Self {
            name: "CLP".to_string(),
            pinned_category: String::new(),
            fetch_account: false,
            fetch_bill: false,
            fetch_estimation: false,
            fetch_bimonthly: false,
            fetch_daily: false,
            fetch_hourly: false,
            hourly_days: 1,
        }
    }
}

impl Default for RenewableSensorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "CLP Renewable Energy".to_string(),
            pinned_category: String::new(),
            fetch_bill: false,
            fetch_daily: false,
            fetch_hourly: false,
            hourly_days: 1,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load() -> Result<Self> {
        let default_paths = [
            "fulmen_config.yaml",
            "/data/fulmen_config.yaml",
            "/etc/fulmen/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.http.timeout_seconds == 0 {
            return Err(FulmenError::config("http.timeout_seconds must be positive"));
        }

        if self.update_interval_seconds == 0 {
            return Err(FulmenError::config(
                "update_interval_seconds must be positive",
            ));
        }

        if self.retry_delay_seconds == 0 {
            return Err(FulmenError::config("retry_delay_seconds must be positive"));
        }

        if self.primary.name.is_empty() {
            return Err(FulmenError::config("primary.name cannot be empty"));
        }

        if !(1..=2).contains(&self.primary.hourly_days) {
            return Err(FulmenError::config("primary.hourly_days must be 1 or 2"));
        }

        if !(1..=2).contains(&self.renewable.hourly_days) {
            return Err(FulmenError::config("renewable.hourly_days must be 1 or 2"));
        }

        EnergyCategory::from_config(&self.primary.pinned_category)?;
        EnergyCategory::from_config(&self.renewable.pinned_category)?;

        Ok(())
    }

    /// Materialize the immutable per-sensor poller configurations
    pub fn poller_configs(&self) -> Result<Vec<PollerConfig>> {
        let timeout = Duration::from_secs(self.http.timeout_seconds);
        let update_interval = Duration::from_secs(self.update_interval_seconds);
        let retry_delay = Duration::from_secs(self.retry_delay_seconds);

        let mut pollers = vec![PollerConfig {
            kind: SensorKind::Primary,
            name: self.primary.name.clone(),
            timeout,
            update_interval,
            retry_delay,
            pinned_category: EnergyCategory::from_config(&self.primary.pinned_category)?,
            fetch_account: self.primary.fetch_account,
            fetch_bill: self.primary.fetch_bill,
            fetch_estimation: self.primary.fetch_estimation,
            fetch_bimonthly: self.primary.fetch_bimonthly,
            fetch_daily: self.primary.fetch_daily,
            fetch_hourly: self.primary.fetch_hourly,
            hourly_days: self.primary.hourly_days,
        }];

        if self.renewable.enabled {
            pollers.push(PollerConfig {
                kind: SensorKind::Renewable,
                name: self.renewable.name.clone(),
                timeout,
                update_interval,
                retry_delay,
                pinned_category: EnergyCategory::from_config(&self.renewable.pinned_category)?,
                fetch_account: false,
                fetch_bill: self.renewable.fetch_bill,
                fetch_estimation: false,
                fetch_bimonthly: false,
                fetch_daily: self.renewable.fetch_daily,
                fetch_hourly: self.renewable.fetch_hourly,
                hourly_days: self.renewable.hourly_days,
            });
        }

        Ok(pollers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.http.timeout_seconds, 30);
        assert_eq!(config.update_interval_seconds, 300);
        assert_eq!(config.primary.name, "CLP");
        assert_eq!(config.primary.hourly_days, 1);
        assert!(!config.renewable.enabled);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.primary.hourly_days = 3;
        assert!(config.validate().is_err());

        config = Config::default();
        config.primary.pinned_category = "weekly".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.update_interval_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.primary.name, deserialized.primary.name);
        assert_eq!(config.http.timeout_seconds, deserialized.http.timeout_seconds);
    }

    #[test]
    fn poller_configs_respect_renewable_toggle() {
        let mut config = Config::default();
        let pollers = config.poller_configs().unwrap();
        assert_eq!(pollers.len(), 1);
        assert_eq!(pollers[0].kind, SensorKind::Primary);

        config.renewable.enabled = true;
        config.renewable.pinned_category = "daily".to_string();
        let pollers = config.poller_configs().unwrap();
        assert_eq!(pollers.len(), 2);
        assert_eq!(pollers[1].kind, SensorKind::Renewable);
        assert_eq!(pollers[1].pinned_category, Some(EnergyCategory::Daily));
        assert!(!pollers[1].fetch_account);
    }
}
