//! # Fulmen - CLP Hong Kong electricity consumption monitor
//!
//! A long-lived polling daemon for the CLP Hong Kong web API, tracking
//! account balance, bills, bimonthly/daily/hourly consumption and renewable
//! feed-in data, and publishing the latest reading with historical detail.
//!
//! ## Features
//!
//! - **Async-first**: all polling multiplexed on the Tokio runtime
//! - **Shared token lifecycle**: one access/refresh pair serialized across
//!   all pollers, persisted across restarts
//! - **Cadence groups**: single-shot, 12-hour and 30-minute refresh tiers
//!   evaluated independently on every tick
//! - **Resilient**: exponential backoff on failure, credential invalidation
//!   on repeated client errors
//! - **Configuration**: YAML-based configuration with validation
//!
//! ## Architecture
//!
//! The application follows a modular architecture with clear separation of
//! concerns:
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `backoff`: Exponential retry delay policy
//! - `credentials`: Durable credential storage
//! - `token`: Shared account state and token refresh
//! - `api`: Authenticated HTTP client for the provider API
//! - `dates`: Provider date formats and fetch windows
//! - `model`: Internal data model and published snapshots
//! - `payload`: Provider wire payload shapes
//! - `poller`: Category fetchers and the poll scheduler
//! - `runtime`: Host harness wiring everything together

pub mod api;
pub mod backoff;
pub mod config;
pub mod credentials;
pub mod dates;
pub mod error;
pub mod logging;
pub mod model;
pub mod payload;
pub mod poller;
pub mod runtime;
pub mod token;

// Re-export commonly used types
pub use config::Config;
pub use error::{FulmenError, Result};
pub use poller::Poller;
pub use runtime::Runtime;
