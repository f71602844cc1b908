//! Authenticated HTTP client for the CLP API
//!
//! All remote calls flow through [`ApiClient::request`]: it enforces the
//! per-call timeout, injects the access token, classifies HTTP failures,
//! invalidates credentials on client errors and unwraps the `data` envelope.
//! The actual HTTP exchange sits behind the [`Transport`] trait so tests can
//! substitute a canned implementation.

use crate::error::{FulmenError, Result};
use crate::logging::get_logger;
use crate::token::Account;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Base of all provider endpoints
pub const API_BASE: &str = "https://api.clp.com.hk";

/// Token refresh endpoint
pub const REFRESH_TOKEN_URL: &str =
    "https://api.clp.com.hk/ts1/ms/profile/identity/manage/account/refresh_token";

/// One-time-password exchange used during account linking
pub const OTP_VERIFY_URL: &str =
    "https://api.clp.com.hk/ts2/ms/profile/accountManagement/passwordlesslogin/otpverify";

/// Service account list
pub const SERVICE_ACCOUNTS_URL: &str =
    "https://api.clp.com.hk/ts1/ms/profile/accountdetails/myServicesCA";

/// Bill and payment transaction history
pub const BILLING_HISTORY_URL: &str =
    "https://api.clp.com.hk/ts1/ms/billing/transaction/historyBilling";

/// Current-period usage estimation
pub const CONSUMPTION_INFO_URL: &str = "https://api.clp.com.hk/ts1/ms/consumption/info";

/// Bimonthly/daily/hourly consumption history
pub const CONSUMPTION_HISTORY_URL: &str = "https://api.clp.com.hk/ts1/ms/consumption/history";

/// Renewable feed-in dashboard
pub const RENEWABLE_DASHBOARD_URL: &str = "https://api.clp.com.hk/ts1/ms/renew/fit/dashboard";

/// HTTP 4xx failures tolerated before the account is disabled
pub const HTTP_CLIENT_ERROR_RETRY_LIMIT: u32 = 3;

/// One outgoing API request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub json: Option<Value>,
    pub query: Vec<(String, String)>,
}

/// Raw response with the body read exactly once
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub url: String,
    pub body: String,
}

/// HTTP exchange seam
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse>;
}

/// Production transport backed by a shared reqwest client
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wrap an existing shared client
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a client with the configured user agent
    pub fn with_user_agent(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
        let mut builder = self.client.request(request.method.clone(), &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.json {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await?;

        Ok(RawResponse { status, url, body })
    }
}

/// Authenticated API client shared by all pollers of one account
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    account: Arc<Account>,
    timeout: Duration,
    logger: crate::logging::StructuredLogger,
}

impl ApiClient {
    /// Create a new client
    pub fn new(transport: Arc<dyn Transport>, account: Arc<Account>, timeout: Duration) -> Self {
        let logger = get_logger("api");
        Self {
            transport,
            account,
            timeout,
            logger,
        }
    }

    /// Shared account state this client operates on
    pub fn account(&self) -> &Arc<Account> {
        &self.account
    }

    /// Issue one API request and unwrap the `data` envelope.
    ///
    /// Client errors (4xx) invalidate the stored credentials immediately and
    /// count toward the shared retry limit; once the limit is exceeded the
    /// account is considered disabled and a terminal error is returned.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        json: Option<Value>,
        query: Vec<(String, String)>,
    ) -> Result<Value> {
        let auth_exempt = url == REFRESH_TOKEN_URL || url == OTP_VERIFY_URL;

        let mut headers = Vec::new();
        if !auth_exempt {
            // The provider expects the raw access token, no Bearer prefix
            match self.account.access_token() {
                Some(token) => headers.push(("Authorization".to_string(), token)),
                None => {
                    return Err(FulmenError::auth(
                        "Problematic authorization. Please configure again, or change your IP address.",
                    ));
                }
            }
        }

        if let Some(body) = &json {
            self.logger
                .debug(&format!("REQUEST {} {} {}", method, url, body));
        } else {
            self.logger.debug(&format!("REQUEST {} {}", method, url));
        }

        let request = ApiRequest {
            method,
            url: url.to_string(),
            headers,
            json,
            query,
        };

        let response = tokio::time::timeout(self.timeout, self.transport.send(&request))
            .await
            .map_err(|_| FulmenError::timeout(format!("request to {} timed out", url)))??;

        if response.status >= 400 {
            return Err(self.classify_failure(&response));
        }

        let envelope: Value = match serde_json::from_str(&response.body) {
            Ok(value) => value,
            Err(e) => {
                self.logger.error(&format!(
                    "RESPONSE {} {} : {}",
                    response.status, response.url, response.body
                ));
                return Err(FulmenError::value(format!("undecodable response: {}", e)));
            }
        };

        let Some(data) = envelope.get("data") else {
            self.logger.error(&format!(
                "RESPONSE {} {} : {}",
                response.status, response.url, envelope
            ));
            return Err(FulmenError::value("Invalid response data"));
        };

        self.logger.debug(&format!(
            "RESPONSE {} {} : {}",
            response.status, response.url, envelope
        ));

        Ok(data.clone())
    }

    /// Classify a non-2xx response, reading the error body exactly once
    fn classify_failure(&self, response: &RawResponse) -> FulmenError {
        let detail = serde_json::from_str::<Value>(&response.body)
            .map(|v| v.to_string())
            .unwrap_or_else(|_| response.body.clone());
        let message = format!("{} {} : {}", response.status, response.url, detail);
        self.logger.error(&message);

        if (400..500).contains(&response.status) {
            // Any 4xx invalidates the session
            let count = self.account.record_client_error();
            self.account.clear_credentials();

            if count > HTTP_CLIENT_ERROR_RETRY_LIMIT {
                self.logger.error("HTTP 4xx error retry limit reached");
                return FulmenError::generic("HTTP 4xx error retry limit reached");
            }

            return FulmenError::http_client(response.status, message);
        }

        FulmenError::http_server(response.status, message)
    }
}
