//! Provider wire payload shapes
//!
//! Typed views of the `data` envelope contents returned by the CLP API.
//! Numeric fields the provider serializes as either a number or a string are
//! handled by a lenient deserializer; date strings stay raw here and are
//! parsed by the fetchers so failures surface as per-fetch parse errors.

use serde::de::{self, Deserializer};
use serde::Deserialize;

/// Token triple returned by the refresh endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPayload {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry timestamp string, persisted verbatim
    pub expires_in: String,
}

/// Token triple returned by the one-time-password exchange.
///
/// The endpoint has answered with both camelCase and snake_case key sets in
/// the wild; accept either.
#[derive(Debug, Clone, Deserialize)]
pub struct OtpTokenPayload {
    #[serde(rename = "accessToken", alias = "access_token")]
    pub access_token: Option<String>,
    #[serde(rename = "refreshToken", alias = "refresh_token")]
    pub refresh_token: Option<String>,
    #[serde(
        rename = "accessTokenExpiredAt",
        alias = "access_token_expiry_time",
        alias = "expires_in"
    )]
    pub expiry: Option<String>,
}

/// One entry of the service-account list
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
    pub status: String,
    pub ca_no: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub outstanding_amount: f64,
    #[serde(default)]
    pub due_date: Option<String>,
}

/// One bill or payment transaction
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillTransaction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub total: f64,
    pub tran_date: String,
    #[serde(default)]
    pub from_date: Option<String>,
    #[serde(default)]
    pub to_date: Option<String>,
}

/// Billing transaction history
#[derive(Debug, Clone, Deserialize)]
pub struct BillingHistory {
    #[serde(default)]
    pub transactions: Vec<BillTransaction>,
}

/// Current-period usage estimation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimationData {
    #[serde(deserialize_with = "lenient_f64")]
    pub current_consumption: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub current_cost: f64,
    #[serde(default)]
    pub current_start_date: Option<String>,
    #[serde(default)]
    pub current_end_date: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub deviation_percent: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub projected_consumption: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub projected_cost: f64,
    #[serde(default)]
    pub projected_start_date: Option<String>,
    #[serde(default)]
    pub projected_end_date: Option<String>,
}

/// Result rows of the consumption history endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumptionResults<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// One bimonthly bill-period row (`mode: Bill`)
#[derive(Debug, Clone, Deserialize)]
pub struct BillPeriodRow {
    #[serde(rename = "totKwh", deserialize_with = "lenient_f64")]
    pub total_kwh: f64,
    /// Billing period end date, `YYYYMMDD`
    pub endabrpe: String,
}

/// One daily or hourly interval row (`mode: Daily` / `mode: Hourly`)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalRow {
    #[serde(rename = "kwhTotal", deserialize_with = "lenient_f64")]
    pub kwh_total: f64,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub expire_date: Option<String>,
}

/// Renewable feed-in dashboard rows
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewableDashboard {
    #[serde(default = "Vec::new")]
    pub consumption_data: Vec<RenewableRow>,
}

/// One renewable feed-in row; kwh totals arrive as numeric strings
#[derive(Debug, Clone, Deserialize)]
pub struct RenewableRow {
    #[serde(deserialize_with = "lenient_f64")]
    pub kwhtotal: f64,
    #[serde(default)]
    pub startdate: Option<String>,
    #[serde(default)]
    pub enddate: Option<String>,
    /// `"Y"` once the provider has finalized the reading
    #[serde(default, rename = "validateStatus")]
    pub validate_status: Option<String>,
}

impl RenewableRow {
    /// Whether the provider has marked this reading as finalized
    pub fn is_validated(&self) -> bool {
        self.validate_status.as_deref() == Some("Y")
    }
}

/// Accept a JSON number or a numeric string
fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientF64;

    impl de::Visitor<'_> for LenientF64 {
        type Value = f64;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a number or numeric string")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<f64, E> {
            v.trim().parse::<f64>().map_err(de::Error::custom)
        }
    }

    deserializer.deserialize_any(LenientF64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_account_accepts_string_amounts() {
        let json = r#"{"status": "Active", "caNo": "1234567890", "outstandingAmount": "123.45", "dueDate": "20240601000000"}"#;
        let account: ServiceAccount = serde_json::from_str(json).unwrap();
        assert_eq!(account.ca_no, "1234567890");
        assert!((account.outstanding_amount - 123.45).abs() < f64::EPSILON);
    }

    #[test]
    fn interval_row_with_missing_dates() {
        let json = r#"{"kwhTotal": 2.5}"#;
        let row: IntervalRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.start_date, None);
        assert_eq!(row.expire_date, None);
    }

    #[test]
    fn renewable_row_validation_flag() {
        let json = r#"{"kwhtotal": "1.5", "startdate": "20240501000000", "validateStatus": "Y"}"#;
        let row: RenewableRow = serde_json::from_str(json).unwrap();
        assert!(row.is_validated());

        let json = r#"{"kwhtotal": 1.5, "startdate": "20240501000000", "validateStatus": "N"}"#;
        let row: RenewableRow = serde_json::from_str(json).unwrap();
        assert!(!row.is_validated());
    }

    #[test]
    fn otp_payload_accepts_both_key_styles() {
        let camel = r#"{"accessToken": "a", "refreshToken": "r", "accessTokenExpiredAt": "2024-05-01T10:00:00.000Z"}"#;
        let payload: OtpTokenPayload = serde_json::from_str(camel).unwrap();
        assert_eq!(payload.access_token.as_deref(), Some("a"));
        assert_eq!(payload.expiry.as_deref(), Some("2024-05-01T10:00:00.000Z"));

        let snake = r#"{"access_token": "a", "refresh_token": "r", "expires_in": "2024-05-01T10:00:00.000Z"}"#;
        let payload: OtpTokenPayload = serde_json::from_str(snake).unwrap();
        assert_eq!(payload.refresh_token.as_deref(), Some("r"));
    }

    #[test]
    fn consumption_results_default_to_empty() {
        let json = r#"{}"#;
        let results: ConsumptionResults<IntervalRow> = serde_json::from_str(json).unwrap();
        assert!(results.results.is_empty());
    }
}
