//! Internal data model for consumption, billing and account state
//!
//! Everything a poller caches or publishes lives here. Detail fields are
//! explicit optionals, always present in serialized snapshots and null until
//! the owning category has been fetched.

use crate::error::{FulmenError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Which of the two sensor flavours a poller drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// Metered grid consumption
    Primary,
    /// Renewable feed-in ("FIT") readings
    Renewable,
}

impl SensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Primary => "primary",
            SensorKind::Renewable => "renewable",
        }
    }
}

/// Data category a reading can come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnergyCategory {
    Bimonthly,
    Daily,
    Hourly,
}

impl EnergyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyCategory::Bimonthly => "BIMONTHLY",
            EnergyCategory::Daily => "DAILY",
            EnergyCategory::Hourly => "HOURLY",
        }
    }

    /// Parse the configured pinned-category string; empty pins nothing
    pub fn from_config(value: &str) -> Result<Option<Self>> {
        match value.to_uppercase().as_str() {
            "" => Ok(None),
            "BIMONTHLY" => Ok(Some(EnergyCategory::Bimonthly)),
            "DAILY" => Ok(Some(EnergyCategory::Daily)),
            "HOURLY" => Ok(Some(EnergyCategory::Hourly)),
            other => Err(FulmenError::config(format!(
                "Unknown energy category: {}",
                other
            ))),
        }
    }
}

/// One consumption period (bimonthly bill period, day or hour)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub kwh: f64,
}

/// One issued bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillRecord {
    pub amount: f64,
    pub transaction_date: NaiveDateTime,
    pub from_date: NaiveDateTime,
    pub to_date: NaiveDateTime,
}

/// One recorded payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub amount: f64,
    pub transaction_date: NaiveDateTime,
}

/// Bill and payment transactions, each sorted newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillHistory {
    pub bills: Vec<BillRecord>,
    pub payments: Vec<PaymentRecord>,
}

/// The active service account's balance state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account_number: String,
    pub outstanding_amount: f64,
    pub due_date: Option<NaiveDateTime>,
}

/// Current-period usage estimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimation {
    pub current_consumption: f64,
    pub current_cost: f64,
    pub current_start_date: Option<NaiveDateTime>,
    pub current_end_date: Option<NaiveDateTime>,
    pub deviation_percent: f64,
    pub projected_consumption: f64,
    pub projected_cost: f64,
    pub projected_start_date: Option<NaiveDateTime>,
    pub projected_end_date: Option<NaiveDateTime>,
}

/// The externally published primary reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Latest kWh value for the effective category
    pub kwh: f64,
    /// Category the value came from
    pub category: EnergyCategory,
    /// Anchor timestamp the value resets from
    pub last_reset: Option<NaiveDateTime>,
}

/// Published sensor state: the current reading plus the attribute bag.
///
/// Category detail fields are populated only when the owning category is
/// enabled in configuration; they serialize as null otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub name: String,
    pub state_data_type: Option<EnergyCategory>,
    pub reading_kwh: Option<f64>,
    pub last_reset: Option<NaiveDateTime>,
    pub error: Option<String>,
    pub account: Option<AccountSummary>,
    pub bills: Option<BillHistory>,
    pub estimation: Option<Estimation>,
    pub bimonthly: Option<Vec<ConsumptionRecord>>,
    pub daily: Option<Vec<ConsumptionRecord>>,
    pub hourly: Option<Vec<ConsumptionRecord>>,
    pub feed_in: Option<Vec<ConsumptionRecord>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_from_config() {
        assert_eq!(EnergyCategory::from_config("").unwrap(), None);
        assert_eq!(
            EnergyCategory::from_config("daily").unwrap(),
            Some(EnergyCategory::Daily)
        );
        assert_eq!(
            EnergyCategory::from_config("BIMONTHLY").unwrap(),
            Some(EnergyCategory::Bimonthly)
        );
        assert!(EnergyCategory::from_config("weekly").is_err());
    }

    #[test]
    fn category_serializes_uppercase() {
        let json = serde_json::to_string(&EnergyCategory::Hourly).unwrap();
        assert_eq!(json, "\"HOURLY\"");
    }

    #[test]
    fn snapshot_keeps_null_fields() {
        let snapshot = SensorSnapshot {
            name: "CLP".to_string(),
            ..SensorSnapshot::default()
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("daily").is_some());
        assert!(value["daily"].is_null());
        assert!(value["error"].is_null());
    }
}
