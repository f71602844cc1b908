//! Category fetchers and the poll scheduler state machine
//!
//! One [`Poller`] exists per sensor. Each tick it refreshes the shared token
//! pair, decides which cadence groups are due, invokes the enabled category
//! fetchers, and publishes a fresh [`SensorSnapshot`] on its watch channel.
//! Failures are recorded and rescheduled with exponential backoff; the
//! regular fixed-interval tick keeps running independently.

use crate::api::{
    ApiClient, BILLING_HISTORY_URL, CONSUMPTION_HISTORY_URL, CONSUMPTION_INFO_URL,
    HTTP_CLIENT_ERROR_RETRY_LIMIT, RENEWABLE_DASHBOARD_URL, SERVICE_ACCOUNTS_URL,
};
use crate::backoff::ExponentialBackoff;
use crate::config::PollerConfig;
use crate::dates::{self, ReferenceDates};
use crate::error::{FulmenError, Result};
use crate::logging::{LogContext, get_logger_with_context};
use crate::model::{
    AccountSummary, BillHistory, BillRecord, ConsumptionRecord, EnergyCategory, Estimation,
    PaymentRecord, Reading, SensorKind, SensorSnapshot,
};
use crate::payload::{
    BillPeriodRow, BillingHistory, ConsumptionResults, EstimationData, IntervalRow,
    RenewableDashboard, ServiceAccount,
};
use crate::token::{Account, TokenManager};
use chrono::{DateTime, Duration as ChronoDuration, NaiveTime};
use chrono_tz::Tz;
use reqwest::Method;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Ceiling for error retry delays
const MAX_RETRY_DELAY: Duration = Duration::from_secs(3600);

/// Whether the 12-hour cadence group is due
fn daily_group_due(last_fetch: Option<DateTime<Tz>>, now: DateTime<Tz>) -> bool {
    last_fetch.is_none_or(|t| now > t + ChronoDuration::hours(12))
}

/// Whether the 30-minute cadence group is due
fn hourly_group_due(last_fetch: Option<DateTime<Tz>>, now: DateTime<Tz>) -> bool {
    last_fetch.is_none_or(|t| now > t + ChronoDuration::minutes(30))
}

/// Result of one scheduler cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// All due cadence groups ran
    Completed,
    /// No access token was available; nothing was attempted
    NoCredentials,
}

/// Poll scheduler and sensor state for one configured sensor
pub struct Poller {
    config: PollerConfig,
    account: Arc<Account>,
    api: Arc<ApiClient>,
    tokens: TokenManager,
    snapshot_tx: watch::Sender<SensorSnapshot>,

    /// Category whose value is published; starts at the configured pin and
    /// sticks to the first category that produces a reading otherwise
    effective_category: Option<EnergyCategory>,
    reading: Option<Reading>,

    account_summary: Option<AccountSummary>,
    bills: Option<BillHistory>,
    estimation: Option<Estimation>,
    bimonthly: Option<Vec<ConsumptionRecord>>,
    daily: Option<Vec<ConsumptionRecord>>,
    hourly: Option<Vec<ConsumptionRecord>>,
    feed_in: Option<Vec<ConsumptionRecord>>,

    single_shot_done: Option<DateTime<Tz>>,
    daily_last_fetch: Option<DateTime<Tz>>,
    hourly_last_fetch: Option<DateTime<Tz>>,

    error: Option<String>,
    backoff: ExponentialBackoff,
    last_run: Option<Instant>,
    retry_at: Option<Instant>,

    logger: crate::logging::StructuredLogger,
}

impl Poller {
    /// Create a poller and the receiving end of its snapshot channel
    pub fn new(
        config: PollerConfig,
        account: Arc<Account>,
        api: Arc<ApiClient>,
    ) -> (Self, watch::Receiver<SensorSnapshot>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(SensorSnapshot {
            name: config.name.clone(),
            ..SensorSnapshot::default()
        });
        let logger = get_logger_with_context(
            LogContext::new("poller").with_sensor(config.name.clone()),
        );
        let backoff = ExponentialBackoff::new(config.retry_delay, MAX_RETRY_DELAY);
        let tokens = TokenManager::new(account.clone());
        let effective_category = config.pinned_category;

        let poller = Self {
            config,
            account,
            api,
            tokens,
            snapshot_tx,
            effective_category,
            reading: None,
            account_summary: None,
            bills: None,
            estimation: None,
            bimonthly: None,
            daily: None,
            hourly: None,
            feed_in: None,
            single_shot_done: None,
            daily_last_fetch: None,
            hourly_last_fetch: None,
            error: None,
            backoff,
            last_run: None,
            retry_at: None,
            logger,
        };

        (poller, snapshot_rx)
    }

    /// Currently published state
    pub fn snapshot(&self) -> SensorSnapshot {
        let is_primary = self.config.kind == SensorKind::Primary;

        SensorSnapshot {
            name: self.config.name.clone(),
            state_data_type: self.reading.as_ref().map(|r| r.category),
            reading_kwh: self.reading.as_ref().map(|r| r.kwh),
            last_reset: self.reading.as_ref().and_then(|r| r.last_reset),
            error: self.error.clone(),
            account: self
                .config
                .fetch_account
                .then(|| self.account_summary.clone())
                .flatten(),
            bills: (self.config.fetch_bill && is_primary)
                .then(|| self.bills.clone())
                .flatten(),
            estimation: self
                .config
                .fetch_estimation
                .then(|| self.estimation.clone())
                .flatten(),
            bimonthly: self
                .config
                .fetch_bimonthly
                .then(|| self.bimonthly.clone())
                .flatten(),
            daily: self.config.fetch_daily.then(|| self.daily.clone()).flatten(),
            hourly: self
                .config
                .fetch_hourly
                .then(|| self.hourly.clone())
                .flatten(),
            feed_in: (self.config.fetch_bill && !is_primary)
                .then(|| self.feed_in.clone())
                .flatten(),
        }
    }

    /// Deadline of the currently scheduled error retry, if any
    pub fn next_retry_at(&self) -> Option<Instant> {
        self.retry_at
    }

    /// Throttled tick entry point.
    ///
    /// Ticks arriving within the minimum update interval of the previous run
    /// are no-ops. Errors are recorded on the snapshot and rescheduled via
    /// the backoff policy; a successful cycle resets both.
    pub async fn update(&mut self) {
        if let Some(last) = self.last_run {
            if last.elapsed() < self.config.update_interval {
                self.logger.trace("Tick inside throttle window, skipping");
                return;
            }
        }
        self.last_run = Some(Instant::now());

        if self.account.client_error_count() > HTTP_CLIENT_ERROR_RETRY_LIMIT {
            self.logger
                .debug("Client-error retry limit exceeded, poller disabled");
            return;
        }

        match self.run_cycle_at(dates::provider_now()).await {
            Ok(CycleOutcome::Completed) => {
                self.backoff.reset();
                self.error = None;
            }
            Ok(CycleOutcome::NoCredentials) => {
                self.logger.debug("No access token available, skipping cycle");
            }
            Err(e) => {
                let message = e.to_string();
                self.logger
                    .error(&format!("{} ERROR: {}", self.config.name, message));
                self.error = Some(message);

                let delay = self.backoff.increment();
                self.logger
                    .info(&format!("Scheduling retry in {} seconds", delay.as_secs()));
                self.retry_at = Some(Instant::now() + delay);
            }
        }

        self.publish();
    }

    /// Run one full cycle against an explicit clock.
    ///
    /// Exposed separately from [`Poller::update`] so the cadence decisions
    /// can be driven with a pinned wall-clock time.
    pub async fn run_cycle_at(&mut self, now: DateTime<Tz>) -> Result<CycleOutcome> {
        self.tokens.ensure_fresh(&self.api).await?;

        if self.account.access_token().is_none() {
            return Ok(CycleOutcome::NoCredentials);
        }

        let need_account = match self.config.kind {
            SensorKind::Primary => {
                self.account.account_number().is_none() || self.config.fetch_account
            }
            SensorKind::Renewable => self.account.account_number().is_none(),
        };
        if self.single_shot_done.is_none() && need_account {
            self.fetch_account_detail(now).await?;
        }

        if daily_group_due(self.daily_last_fetch, now) {
            match self.config.kind {
                SensorKind::Primary => {
                    if self.config.fetch_bill {
                        self.fetch_bill_history(now).await?;
                    }
                    if self.config.fetch_estimation {
                        self.fetch_estimation(now).await?;
                    }
                    if self.config.fetch_bimonthly || self.matches(EnergyCategory::Bimonthly) {
                        self.fetch_bimonthly(now).await?;
                    }
                    if self.config.fetch_daily || self.matches(EnergyCategory::Daily) {
                        self.fetch_daily(now).await?;
                    }
                }
                SensorKind::Renewable => {
                    if self.config.fetch_bill || self.matches(EnergyCategory::Bimonthly) {
                        self.fetch_feed_in_periods(now).await?;
                    }
                    if self.config.fetch_daily || self.matches(EnergyCategory::Daily) {
                        self.fetch_renewable_daily(now).await?;
                    }
                }
            }
        }

        if hourly_group_due(self.hourly_last_fetch, now)
            && (self.config.fetch_hourly || self.matches(EnergyCategory::Hourly))
        {
            match self.config.kind {
                SensorKind::Primary => self.fetch_hourly(now).await?,
                SensorKind::Renewable => self.fetch_renewable_hourly(now).await?,
            }
        }

        // Without a pinned category, stick to whichever category produced
        // the reading first
        if self.effective_category.is_none() {
            if let Some(reading) = &self.reading {
                self.effective_category = Some(reading.category);
            }
        }

        Ok(CycleOutcome::Completed)
    }

    /// Drive the poller forever: fixed-interval ticks plus backoff retries
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let retry_at = self.retry_at;
            tokio::select! {
                _ = ticker.tick() => {}
                _ = sleep_until_deadline(retry_at), if retry_at.is_some() => {
                    self.retry_at = None;
                }
            }
            self.update().await;
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }

    /// Whether this category feeds the published reading
    fn matches(&self, category: EnergyCategory) -> bool {
        self.effective_category.is_none_or(|c| c == category)
    }

    fn set_reading(
        &mut self,
        kwh: f64,
        category: EnergyCategory,
        last_reset: Option<chrono::NaiveDateTime>,
    ) {
        self.reading = Some(Reading {
            kwh,
            category,
            last_reset,
        });
    }

    /// Single-shot lookup of the active service account
    async fn fetch_account_detail(&mut self, now: DateTime<Tz>) -> Result<()> {
        let data = self
            .api
            .request(Method::GET, SERVICE_ACCOUNTS_URL, None, Vec::new())
            .await?;
        let accounts: Vec<ServiceAccount> = serde_json::from_value(data)
            .map_err(|e| FulmenError::parse(format!("unexpected service account list: {}", e)))?;

        match accounts.into_iter().find(|a| a.status == "Active") {
            None => {
                self.account.set_account_number(None)?;
                self.account_summary = None;
            }
            Some(active) => {
                let due_date = dates::parse_optional_compact_datetime(active.due_date.as_deref())?;
                self.account.set_account_number(Some(active.ca_no.clone()))?;
                self.account_summary = Some(AccountSummary {
                    account_number: active.ca_no,
                    outstanding_amount: active.outstanding_amount,
                    due_date,
                });
            }
        }

        self.single_shot_done = Some(now);
        Ok(())
    }

    /// Bill and payment transaction history
    async fn fetch_bill_history(&mut self, now: DateTime<Tz>) -> Result<()> {
        let body = json!({
            "caList": [
                { "ca": self.account.account_number() },
            ],
        });
        let data = self
            .api
            .request(Method::POST, BILLING_HISTORY_URL, Some(body), Vec::new())
            .await?;
        let history: BillingHistory = serde_json::from_value(data)
            .map_err(|e| FulmenError::parse(format!("unexpected billing history: {}", e)))?;

        if history.transactions.is_empty() {
            return Ok(());
        }

        let mut bills = Vec::new();
        let mut payments = Vec::new();
        for row in &history.transactions {
            match row.kind.as_str() {
                "bill" => {
                    let from_date = row
                        .from_date
                        .as_deref()
                        .ok_or_else(|| FulmenError::parse("bill transaction missing fromDate"))?;
                    let to_date = row
                        .to_date
                        .as_deref()
                        .ok_or_else(|| FulmenError::parse("bill transaction missing toDate"))?;
                    bills.push(BillRecord {
                        amount: row.total,
                        transaction_date: dates::parse_compact_datetime(&row.tran_date)?,
                        from_date: dates::parse_compact_datetime(from_date)?,
                        to_date: dates::parse_compact_datetime(to_date)?,
                    });
                }
                "payment" => {
                    payments.push(PaymentRecord {
                        amount: row.total,
                        transaction_date: dates::parse_compact_datetime(&row.tran_date)?,
                    });
                }
                _ => continue,
            }
        }

        bills.sort_by(|a, b| b.transaction_date.cmp(&a.transaction_date));
        payments.sort_by(|a, b| b.transaction_date.cmp(&a.transaction_date));
        self.bills = Some(BillHistory { bills, payments });
        self.daily_last_fetch = Some(now);
        Ok(())
    }

    /// Current-period usage estimation
    async fn fetch_estimation(&mut self, now: DateTime<Tz>) -> Result<()> {
        let query = vec![(
            "ca".to_string(),
            self.account.account_number().unwrap_or_default(),
        )];
        let data = self
            .api
            .request(Method::GET, CONSUMPTION_INFO_URL, None, query)
            .await?;

        if data.is_null() {
            return Ok(());
        }

        let estimation: EstimationData = serde_json::from_value(data)
            .map_err(|e| FulmenError::parse(format!("unexpected estimation payload: {}", e)))?;

        self.estimation = Some(Estimation {
            current_consumption: estimation.current_consumption,
            current_cost: estimation.current_cost,
            current_start_date: dates::parse_optional_compact_datetime(
                estimation.current_start_date.as_deref(),
            )?,
            current_end_date: dates::parse_optional_compact_datetime(
                estimation.current_end_date.as_deref(),
            )?,
            deviation_percent: estimation.deviation_percent,
            projected_consumption: estimation.projected_consumption,
            projected_cost: estimation.projected_cost,
            projected_start_date: dates::parse_optional_compact_datetime(
                estimation.projected_start_date.as_deref(),
            )?,
            projected_end_date: dates::parse_optional_compact_datetime(
                estimation.projected_end_date.as_deref(),
            )?,
        });
        self.daily_last_fetch = Some(now);
        Ok(())
    }

    /// Bimonthly bill-period consumption
    async fn fetch_bimonthly(&mut self, now: DateTime<Tz>) -> Result<()> {
        let refs = ReferenceDates::from_now(now);
        let body = json!({
            "ca": self.account.account_number(),
            "fromDate": dates::format_request_date(refs.fourteen_months_ago),
            "mode": "Bill",
            "toDate": dates::format_request_date(refs.today),
            "type": "Unit",
        });
        let data = self
            .api
            .request(Method::POST, CONSUMPTION_HISTORY_URL, Some(body), Vec::new())
            .await?;

        if data.is_null() {
            return Ok(());
        }

        let results: ConsumptionResults<BillPeriodRow> = serde_json::from_value(data)
            .map_err(|e| FulmenError::parse(format!("unexpected bimonthly payload: {}", e)))?;

        if self.matches(EnergyCategory::Bimonthly) {
            let newest = results
                .results
                .first()
                .ok_or_else(|| FulmenError::value("empty bimonthly results"))?;
            let period_end = dates::parse_compact_date(&newest.endabrpe)?.and_time(NaiveTime::MIN);
            self.set_reading(newest.total_kwh, EnergyCategory::Bimonthly, Some(period_end));
        }

        if self.config.fetch_bimonthly {
            let mut rows = results
                .results
                .iter()
                .map(|row| {
                    Ok(ConsumptionRecord {
                        start: None,
                        end: Some(dates::parse_compact_date(&row.endabrpe)?.and_time(NaiveTime::MIN)),
                        kwh: row.total_kwh,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            rows.sort_by(|a, b| b.end.cmp(&a.end));
            self.bimonthly = Some(rows);
        }

        self.daily_last_fetch = Some(now);
        Ok(())
    }

    /// Daily consumption for the current month
    async fn fetch_daily(&mut self, now: DateTime<Tz>) -> Result<()> {
        let refs = ReferenceDates::from_now(now);
        let body = json!({
            "ca": self.account.account_number(),
            "fromDate": dates::format_request_date(refs.this_month),
            "mode": "Daily",
            "toDate": dates::format_request_date(refs.next_month),
            "type": "Unit",
        });
        let data = self
            .api
            .request(Method::POST, CONSUMPTION_HISTORY_URL, Some(body), Vec::new())
            .await?;

        if data.is_null() {
            return Ok(());
        }

        let results: ConsumptionResults<IntervalRow> = serde_json::from_value(data)
            .map_err(|e| FulmenError::parse(format!("unexpected daily payload: {}", e)))?;

        if self.matches(EnergyCategory::Daily) {
            let latest = results
                .results
                .last()
                .ok_or_else(|| FulmenError::value("empty daily results"))?;
            let end = latest
                .expire_date
                .as_deref()
                .ok_or_else(|| FulmenError::parse("daily row missing expireDate"))?;
            self.set_reading(
                latest.kwh_total,
                EnergyCategory::Daily,
                Some(dates::parse_compact_datetime(end)?),
            );
        }

        if self.config.fetch_daily {
            let mut rows = results
                .results
                .iter()
                .map(|row| {
                    Ok(ConsumptionRecord {
                        start: dates::parse_optional_compact_datetime(row.start_date.as_deref())?,
                        end: dates::parse_optional_compact_datetime(row.expire_date.as_deref())?,
                        kwh: row.kwh_total,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            rows.sort_by(|a, b| b.start.cmp(&a.start));
            self.daily = Some(rows);
        }

        self.daily_last_fetch = Some(now);
        Ok(())
    }

    /// Hourly consumption over the configured lookback window, one request
    /// per calendar day
    async fn fetch_hourly(&mut self, now: DateTime<Tz>) -> Result<()> {
        let windows = dates::hourly_windows(now, self.config.hourly_days);
        let last_index = windows.len();
        let mut collected: Vec<ConsumptionRecord> = Vec::new();

        for (i, window) in windows.iter().enumerate() {
            let body = json!({
                "ca": self.account.account_number(),
                "fromDate": dates::format_request_date(window.from),
                "mode": "Hourly",
                "toDate": dates::format_request_date(window.to),
                "type": "Unit",
            });
            let data = self
                .api
                .request(Method::POST, CONSUMPTION_HISTORY_URL, Some(body), Vec::new())
                .await?;
            let results: ConsumptionResults<IntervalRow> = serde_json::from_value(data)
                .map_err(|e| FulmenError::parse(format!("unexpected hourly payload: {}", e)))?;

            if results.results.is_empty() {
                continue;
            }

            if i + 1 == last_index && self.matches(EnergyCategory::Hourly) {
                if let Some(latest) = results.results.last() {
                    let end = latest
                        .expire_date
                        .as_deref()
                        .ok_or_else(|| FulmenError::parse("hourly row missing expireDate"))?;
                    self.set_reading(
                        latest.kwh_total,
                        EnergyCategory::Hourly,
                        Some(dates::parse_compact_datetime(end)?),
                    );
                }
            }

            if self.config.fetch_hourly {
                for row in &results.results {
                    let start = row
                        .start_date
                        .as_deref()
                        .ok_or_else(|| FulmenError::parse("hourly row missing startDate"))?;
                    collected.push(ConsumptionRecord {
                        start: Some(dates::parse_compact_datetime(start)?),
                        end: None,
                        kwh: row.kwh_total,
                    });
                }
            }

            self.hourly_last_fetch = Some(now);
        }

        if self.config.fetch_hourly {
            collected.sort_by(|a, b| b.start.cmp(&a.start));
            self.hourly = Some(collected);
        }

        Ok(())
    }

    /// Renewable feed-in bill periods (dashboard mode `B`)
    async fn fetch_feed_in_periods(&mut self, now: DateTime<Tz>) -> Result<()> {
        let body = json!({
            "caNo": self.account.account_number(),
            "mode": "B",
            "startDate": dates::format_us_date(now),
        });
        let data = self
            .api
            .request(Method::POST, RENEWABLE_DASHBOARD_URL, Some(body), Vec::new())
            .await?;
        let dashboard: RenewableDashboard = serde_json::from_value(data)
            .map_err(|e| FulmenError::parse(format!("unexpected feed-in payload: {}", e)))?;

        if dashboard.consumption_data.is_empty() {
            return Ok(());
        }

        if self.matches(EnergyCategory::Bimonthly) {
            if let Some(latest) = dashboard.consumption_data.last() {
                let end = latest
                    .enddate
                    .as_deref()
                    .ok_or_else(|| FulmenError::parse("feed-in row missing enddate"))?;
                self.set_reading(
                    latest.kwhtotal,
                    EnergyCategory::Bimonthly,
                    Some(dates::parse_compact_datetime(end)?),
                );
            }
        }

        if self.config.fetch_bill {
            let mut rows = dashboard
                .consumption_data
                .iter()
                .map(|row| {
                    let start = row
                        .startdate
                        .as_deref()
                        .ok_or_else(|| FulmenError::parse("feed-in row missing startdate"))?;
                    let end = row
                        .enddate
                        .as_deref()
                        .ok_or_else(|| FulmenError::parse("feed-in row missing enddate"))?;
                    Ok(ConsumptionRecord {
                        start: Some(dates::parse_compact_datetime(start)?),
                        end: Some(dates::parse_compact_datetime(end)?),
                        kwh: row.kwhtotal,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            rows.sort_by(|a, b| b.start.cmp(&a.start));
            self.feed_in = Some(rows);
        }

        self.daily_last_fetch = Some(now);
        Ok(())
    }

    /// Renewable daily feed-in (dashboard mode `D`)
    async fn fetch_renewable_daily(&mut self, now: DateTime<Tz>) -> Result<()> {
        let body = json!({
            "caNo": self.account.account_number(),
            "mode": "D",
            "startDate": dates::format_us_date(now),
        });
        let data = self
            .api
            .request(Method::POST, RENEWABLE_DASHBOARD_URL, Some(body), Vec::new())
            .await?;
        let dashboard: RenewableDashboard = serde_json::from_value(data)
            .map_err(|e| FulmenError::parse(format!("unexpected renewable daily payload: {}", e)))?;

        if dashboard.consumption_data.is_empty() {
            return Ok(());
        }

        if self.matches(EnergyCategory::Daily) {
            // Newest validated reading wins
            let mut rows: Vec<_> = dashboard.consumption_data.iter().collect();
            rows.sort_by(|a, b| b.startdate.cmp(&a.startdate));
            if let Some(row) = rows.into_iter().find(|r| r.is_validated()) {
                let start = row
                    .startdate
                    .as_deref()
                    .ok_or_else(|| FulmenError::parse("renewable row missing startdate"))?;
                self.set_reading(
                    row.kwhtotal,
                    EnergyCategory::Daily,
                    Some(dates::parse_compact_datetime(start)?),
                );
            }
        }

        if self.config.fetch_daily {
            let mut rows = dashboard
                .consumption_data
                .iter()
                .map(|row| {
                    Ok(ConsumptionRecord {
                        start: dates::parse_optional_compact_datetime(row.startdate.as_deref())?,
                        end: None,
                        kwh: row.kwhtotal,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            rows.sort_by(|a, b| b.start.cmp(&a.start));
            self.daily = Some(rows);
        }

        self.daily_last_fetch = Some(now);
        Ok(())
    }

    /// Renewable hourly feed-in (dashboard mode `H`), unvalidated rows
    /// excluded from the detail history
    async fn fetch_renewable_hourly(&mut self, now: DateTime<Tz>) -> Result<()> {
        let windows = dates::hourly_windows(now, self.config.hourly_days);
        let mut collected: Vec<ConsumptionRecord> = Vec::new();

        for (i, window) in windows.iter().enumerate() {
            let body = json!({
                "caNo": self.account.account_number(),
                "mode": "H",
                "startDate": dates::format_us_date(window.from),
            });
            let data = self
                .api
                .request(Method::POST, RENEWABLE_DASHBOARD_URL, Some(body), Vec::new())
                .await?;
            let dashboard: RenewableDashboard = serde_json::from_value(data).map_err(|e| {
                FulmenError::parse(format!("unexpected renewable hourly payload: {}", e))
            })?;

            if dashboard.consumption_data.is_empty() {
                continue;
            }

            if i == 0 && self.matches(EnergyCategory::Hourly) {
                let mut rows: Vec<_> = dashboard.consumption_data.iter().collect();
                rows.sort_by(|a, b| b.startdate.cmp(&a.startdate));
                if let Some(row) = rows.into_iter().find(|r| r.is_validated()) {
                    let start = row
                        .startdate
                        .as_deref()
                        .ok_or_else(|| FulmenError::parse("renewable row missing startdate"))?;
                    self.set_reading(
                        row.kwhtotal,
                        EnergyCategory::Hourly,
                        Some(dates::parse_compact_datetime(start)?),
                    );
                }
            }

            if self.config.fetch_hourly {
                for row in &dashboard.consumption_data {
                    if !row.is_validated() {
                        continue;
                    }
                    let start = row
                        .startdate
                        .as_deref()
                        .ok_or_else(|| FulmenError::parse("renewable row missing startdate"))?;
                    collected.push(ConsumptionRecord {
                        start: Some(dates::parse_compact_datetime(start)?),
                        end: None,
                        kwh: row.kwhtotal,
                    });
                }
            }

            self.hourly_last_fetch = Some(now);
        }

        if self.config.fetch_hourly {
            collected.sort_by(|a, b| b.start.cmp(&a.start));
            self.hourly = Some(collected);
        }

        Ok(())
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}
