use chrono::{DateTime, Duration as ChronoDuration, TimeZone};
use chrono_tz::Tz;
use fulmen::api::{
    ApiClient, ApiRequest, CONSUMPTION_HISTORY_URL, RENEWABLE_DASHBOARD_URL, RawResponse, Transport,
};
use fulmen::config::PollerConfig;
use fulmen::credentials::{CredentialStore, Credentials};
use fulmen::dates::PROVIDER_TZ;
use fulmen::error::Result;
use fulmen::model::{EnergyCategory, SensorKind};
use fulmen::poller::{CycleOutcome, Poller};
use fulmen::token::Account;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

#[derive(Default)]
struct MemoryStore {
    inner: StdMutex<Credentials>,
}

impl MemoryStore {
    fn seeded(credentials: Credentials) -> Self {
        Self {
            inner: StdMutex::new(credentials),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Result<Credentials> {
        Ok(self.inner.lock().unwrap().clone())
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        *self.inner.lock().unwrap() = credentials.clone();
        Ok(())
    }
}

type Responder = Box<dyn Fn(&ApiRequest) -> Option<RawResponse> + Send + Sync>;

/// Transport routing requests through registered responders, keeping a log
#[derive(Default)]
struct FakeTransport {
    responders: Vec<Responder>,
    log: StdMutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    fn new() -> Self {
        Self::default()
    }

    fn route(
        mut self,
        responder: impl Fn(&ApiRequest) -> Option<RawResponse> + Send + Sync + 'static,
    ) -> Self {
        self.responders.push(Box::new(responder));
        self
    }

    fn request_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    fn count_mode(&self, mode: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| mode_of(r).as_deref() == Some(mode))
            .count()
    }
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
        self.log.lock().unwrap().push(request.clone());
        for responder in &self.responders {
            if let Some(response) = responder(request) {
                return Ok(response);
            }
        }
        Ok(RawResponse {
            status: 404,
            url: request.url.clone(),
            body: "{}".to_string(),
        })
    }
}

fn mode_of(request: &ApiRequest) -> Option<String> {
    request
        .json
        .as_ref()
        .and_then(|j| j.get("mode"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

fn ok(body: &str) -> RawResponse {
    RawResponse {
        status: 200,
        url: "https://api.clp.com.hk/test".to_string(),
        body: body.to_string(),
    }
}

fn hk(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
    PROVIDER_TZ.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

fn linked_credentials() -> Credentials {
    Credentials {
        access_token: Some("access".to_string()),
        refresh_token: Some("refresh".to_string()),
        expiry: Some("2099-01-01T00:00:00.000Z".to_string()),
        account_number: Some("1234567890".to_string()),
    }
}

fn linked_account() -> Arc<Account> {
    Arc::new(Account::new(Arc::new(MemoryStore::seeded(linked_credentials()))).unwrap())
}

fn primary_config(pinned: Option<EnergyCategory>) -> PollerConfig {
    PollerConfig {
        kind: SensorKind::Primary,
        name: "CLP".to_string(),
        timeout: Duration::from_secs(5),
        update_interval: Duration::ZERO,
        retry_delay: Duration::from_secs(300),
        pinned_category: pinned,
        fetch_account: false,
        fetch_bill: false,
        fetch_estimation: false,
        fetch_bimonthly: false,
        fetch_daily: true,
        fetch_hourly: false,
        hourly_days: 1,
    }
}

fn poller_with(
    transport: Arc<FakeTransport>,
    account: Arc<Account>,
    config: PollerConfig,
) -> Poller {
    let api = Arc::new(ApiClient::new(
        transport,
        account.clone(),
        Duration::from_secs(5),
    ));
    let (poller, _snapshot_rx) = Poller::new(config, account, api);
    poller
}

const DAILY_BODY: &str = r#"{"data": {"results": [
    {"kwhTotal": 1.0, "startDate": "20240501000000", "expireDate": "20240502000000"},
    {"kwhTotal": 2.0, "startDate": "20240502000000", "expireDate": "20240503000000"},
    {"kwhTotal": 3.0, "startDate": "20240503000000", "expireDate": "20240504000000"}
]}}"#;

const BIMONTHLY_BODY: &str =
    r#"{"data": {"results": [{"totKwh": 100.0, "endabrpe": "20240430"}]}}"#;

const EMPTY_RESULTS_BODY: &str = r#"{"data": {"results": []}}"#;

fn daily_route(transport: FakeTransport) -> FakeTransport {
    transport.route(|req| {
        (req.url == CONSUMPTION_HISTORY_URL && mode_of(req).as_deref() == Some("Daily"))
            .then(|| ok(DAILY_BODY))
    })
}

#[tokio::test]
async fn daily_scenario_publishes_latest_reading() {
    let transport = Arc::new(daily_route(FakeTransport::new()));
    let account = linked_account();
    let mut poller = poller_with(
        transport.clone(),
        account,
        primary_config(Some(EnergyCategory::Daily)),
    );

    let outcome = poller.run_cycle_at(hk(2024, 5, 15, 10, 0)).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Completed);

    let snapshot = poller.snapshot();
    assert_eq!(snapshot.reading_kwh, Some(3.0));
    assert_eq!(snapshot.state_data_type, Some(EnergyCategory::Daily));
    assert_eq!(snapshot.error, None);

    let daily = snapshot.daily.expect("daily collection present");
    assert_eq!(daily.len(), 3);
    let kwh: Vec<f64> = daily.iter().map(|r| r.kwh).collect();
    assert_eq!(kwh, vec![3.0, 2.0, 1.0]);
    // Strictly non-increasing by start date
    assert!(daily.windows(2).all(|w| w[0].start >= w[1].start));
}

#[tokio::test]
async fn repeated_cycles_are_idempotent() {
    let transport = Arc::new(daily_route(FakeTransport::new()));
    let account = linked_account();
    let mut poller = poller_with(
        transport.clone(),
        account,
        primary_config(Some(EnergyCategory::Daily)),
    );

    let now = hk(2024, 5, 15, 10, 0);
    poller.run_cycle_at(now).await.unwrap();
    let first = poller.snapshot();

    poller.run_cycle_at(now).await.unwrap();
    let second = poller.snapshot();

    assert_eq!(first, second);
    // The daily group is freshly stamped, so no second fetch happened
    assert_eq!(transport.count_mode("Daily"), 1);
}

#[tokio::test]
async fn daily_group_refreshes_only_after_twelve_hours() {
    let transport = Arc::new(daily_route(FakeTransport::new()));
    let account = linked_account();
    let mut poller = poller_with(
        transport.clone(),
        account,
        primary_config(Some(EnergyCategory::Daily)),
    );

    let start = hk(2024, 5, 15, 8, 0);
    poller.run_cycle_at(start).await.unwrap();
    assert_eq!(transport.count_mode("Daily"), 1);

    // Eleven hours later: not yet due
    poller
        .run_cycle_at(start + ChronoDuration::hours(11))
        .await
        .unwrap();
    assert_eq!(transport.count_mode("Daily"), 1);

    // Thirteen hours later: due again
    poller
        .run_cycle_at(start + ChronoDuration::hours(13))
        .await
        .unwrap();
    assert_eq!(transport.count_mode("Daily"), 2);
}

#[tokio::test]
async fn unpinned_poller_adopts_the_reading_category() {
    let transport = Arc::new(
        daily_route(FakeTransport::new().route(|req| {
            (req.url == CONSUMPTION_HISTORY_URL && mode_of(req).as_deref() == Some("Bill"))
                .then(|| ok(BIMONTHLY_BODY))
        }))
        .route(|req| {
            (req.url == CONSUMPTION_HISTORY_URL && mode_of(req).as_deref() == Some("Hourly"))
                .then(|| ok(EMPTY_RESULTS_BODY))
        }),
    );
    let account = linked_account();
    let mut poller = poller_with(transport.clone(), account, primary_config(None));

    let start = hk(2024, 5, 15, 8, 0);
    poller.run_cycle_at(start).await.unwrap();

    // With no pinned category every fetcher ran once; the daily fetcher set
    // the reading last and becomes sticky
    assert_eq!(transport.count_mode("Bill"), 1);
    assert_eq!(transport.count_mode("Daily"), 1);
    assert_eq!(transport.count_mode("Hourly"), 1);
    let snapshot = poller.snapshot();
    assert_eq!(snapshot.state_data_type, Some(EnergyCategory::Daily));
    assert_eq!(snapshot.reading_kwh, Some(3.0));

    // Next due cycle only polls the adopted category
    poller
        .run_cycle_at(start + ChronoDuration::hours(13))
        .await
        .unwrap();
    assert_eq!(transport.count_mode("Bill"), 1);
    assert_eq!(transport.count_mode("Daily"), 2);
    assert_eq!(transport.count_mode("Hourly"), 1);
}

#[tokio::test]
async fn renewable_reading_skips_unvalidated_rows() {
    let transport = Arc::new(FakeTransport::new().route(|req| {
        (req.url == RENEWABLE_DASHBOARD_URL && mode_of(req).as_deref() == Some("D")).then(|| {
            ok(r#"{"data": {"consumptionData": [
                {"kwhtotal": "5.5", "startdate": "20240502000000", "validateStatus": "Y"},
                {"kwhtotal": "9.9", "startdate": "20240503000000", "validateStatus": "N"}
            ]}}"#)
        })
    }));
    let account = linked_account();
    let config = PollerConfig {
        kind: SensorKind::Renewable,
        name: "CLP Renewable Energy".to_string(),
        fetch_account: false,
        fetch_bill: false,
        fetch_estimation: false,
        fetch_bimonthly: false,
        ..primary_config(Some(EnergyCategory::Daily))
    };
    let mut poller = poller_with(transport, account, config);

    poller.run_cycle_at(hk(2024, 5, 15, 10, 0)).await.unwrap();

    let snapshot = poller.snapshot();
    // The newest row is unvalidated; the reading falls back to the newest
    // validated one
    assert_eq!(snapshot.reading_kwh, Some(5.5));
    assert_eq!(snapshot.state_data_type, Some(EnergyCategory::Daily));

    // The daily detail history still includes unvalidated rows
    let daily = snapshot.daily.expect("daily collection present");
    assert_eq!(daily.len(), 2);
    let kwh: Vec<f64> = daily.iter().map(|r| r.kwh).collect();
    assert_eq!(kwh, vec![9.9, 5.5]);
}

#[tokio::test]
async fn client_errors_invalidate_credentials_and_disable_the_poller() {
    let transport = Arc::new(FakeTransport::new().route(|req| {
        Some(RawResponse {
            status: 400,
            url: req.url.clone(),
            body: r#"{"error": "denied"}"#.to_string(),
        })
    }));
    let store = Arc::new(MemoryStore::seeded(linked_credentials()));
    let account = Arc::new(Account::new(store).unwrap());
    let mut poller = poller_with(
        transport.clone(),
        account.clone(),
        primary_config(Some(EnergyCategory::Daily)),
    );

    for round in 1..=4u32 {
        account.set_credentials(linked_credentials()).unwrap();
        poller.update().await;

        // Every 4xx clears the stored credentials immediately
        assert_eq!(account.access_token(), None);
        assert_eq!(account.refresh_token(), None);
        assert_eq!(account.account_number(), None);
        assert_eq!(account.client_error_count(), round);
        assert!(poller.snapshot().error.is_some());
    }

    // Limit exceeded: even with restored credentials no request fires
    account.set_credentials(linked_credentials()).unwrap();
    let before = transport.request_count();
    poller.update().await;
    assert_eq!(transport.request_count(), before);
}

#[tokio::test]
async fn first_run_without_credentials_aborts_silently() {
    let transport = Arc::new(FakeTransport::new());
    let account = Arc::new(Account::new(Arc::new(MemoryStore::default())).unwrap());
    let mut poller = poller_with(
        transport.clone(),
        account,
        primary_config(Some(EnergyCategory::Daily)),
    );

    let outcome = poller.run_cycle_at(hk(2024, 5, 15, 10, 0)).await.unwrap();
    assert_eq!(outcome, CycleOutcome::NoCredentials);
    assert_eq!(transport.request_count(), 0);
    assert_eq!(poller.snapshot().error, None);
}

#[tokio::test]
async fn failed_cycle_records_error_and_keeps_last_reading() {
    let flaky = Arc::new(StdMutex::new(false));
    let flaky_flag = flaky.clone();
    let transport = Arc::new(FakeTransport::new().route(move |req| {
        if *flaky_flag.lock().unwrap() {
            Some(RawResponse {
                status: 500,
                url: req.url.clone(),
                body: "server exploded".to_string(),
            })
        } else {
            (mode_of(req).as_deref() == Some("Daily")).then(|| ok(DAILY_BODY))
        }
    }));
    let account = linked_account();
    let mut poller = poller_with(
        transport,
        account.clone(),
        primary_config(Some(EnergyCategory::Daily)),
    );

    poller.update().await;
    assert_eq!(poller.snapshot().reading_kwh, Some(3.0));
    assert!(poller.next_retry_at().is_none());

    // Expire the token so the next cycle must refresh, and fail the refresh
    // call with a server error
    let mut expired = linked_credentials();
    expired.expiry = Some("2020-01-01T00:00:00.000Z".to_string());
    account.set_credentials(expired).unwrap();
    *flaky.lock().unwrap() = true;

    poller.update().await;
    let snapshot = poller.snapshot();
    // The reading survives the failure; the error is surfaced alongside it
    assert_eq!(snapshot.reading_kwh, Some(3.0));
    assert!(snapshot.error.is_some());
    assert!(poller.next_retry_at().is_some());
}
