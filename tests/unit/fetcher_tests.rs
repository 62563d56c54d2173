// Cache-aside fetcher behavior tests
// Collaborators are replaced with recording fakes so call counts can be asserted

use async_trait::async_trait;
use reqwest::Url;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use kumo::cache::{CacheEntry, CacheError, ExpiringKeyValueStore, MemoryStore};
use kumo::clock::{Clock, ManualClock};
use kumo::error::FetchError;
use kumo::fetcher::{CacheAsideFetcher, FetcherSettings};
use kumo::format::Source;
use kumo::origin::{OriginClient, OriginError, WeatherEndpoint};
use kumo::secrets::{SecretError, SecretStore};

const T: i64 = 1_714_521_600;
const TOKYO: &str = "1850147";

fn tokyo_payload() -> Value {
    json!({
        "coord": {"lon": 139.6917, "lat": 35.6895},
        "weather": [{"id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d"}],
        "main": {"temp": 18.4, "feels_like": 17.9, "humidity": 64, "pressure": 1015},
        "wind": {"speed": 4.1, "deg": 150},
        "sys": {"country": "JP"},
        "id": 1850147,
        "name": "Tokyo"
    })
}

// --- fakes ---

#[derive(Default)]
struct RecordingSecrets {
    value: Option<String>,
    fail: bool,
    calls: AtomicUsize,
}

impl RecordingSecrets {
    fn with_value(value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for RecordingSecrets {
    async fn get(&self, _name: &str, decrypt: bool) -> Result<Option<String>, SecretError> {
        assert!(decrypt, "API key must be requested with decryption");
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SecretError::Backend("AccessDeniedException".to_string()));
        }
        Ok(self.value.clone())
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

struct RecordingOrigin {
    payload: Mutex<Option<Value>>,
    calls: AtomicUsize,
    urls: Mutex<Vec<Url>>,
}

impl RecordingOrigin {
    fn serving(payload: Value) -> Self {
        Self {
            payload: Mutex::new(Some(payload)),
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            payload: Mutex::new(None),
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    fn set_payload(&self, payload: Option<Value>) {
        *self.payload.lock().unwrap() = payload;
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_url(&self) -> Url {
        self.urls.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl OriginClient for RecordingOrigin {
    async fn get_json(&self, url: &Url) -> Result<Value, OriginError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.clone());
        self.payload
            .lock()
            .unwrap()
            .clone()
            .ok_or(OriginError::Status(503))
    }
}

/// Memory store whose reads and/or writes can be forced to fail
struct FlakyStore {
    inner: MemoryStore,
    fail_reads: bool,
    fail_writes: bool,
    puts: Mutex<Vec<CacheEntry>>,
}

impl FlakyStore {
    fn new(fail_reads: bool, fail_writes: bool) -> Self {
        Self {
            inner: MemoryStore::new(16),
            fail_reads,
            fail_writes,
            puts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ExpiringKeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        if self.fail_reads {
            return Err(CacheError::Backend("ProvisionedThroughputExceeded".to_string()));
        }
        self.inner.get(key).await
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.puts.lock().unwrap().push(entry.clone());
        if self.fail_writes {
            return Err(CacheError::Backend("ConditionalCheckFailed".to_string()));
        }
        self.inner.put(entry).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

struct Harness {
    fetcher: CacheAsideFetcher,
    secrets: Arc<RecordingSecrets>,
    origin: Arc<RecordingOrigin>,
    store: Arc<FlakyStore>,
    clock: Arc<ManualClock>,
}

fn harness(secrets: RecordingSecrets, origin: RecordingOrigin, store: FlakyStore) -> Harness {
    let secrets = Arc::new(secrets);
    let origin = Arc::new(origin);
    let store = Arc::new(store);
    let clock = Arc::new(ManualClock::at_epoch_seconds(T));

    let settings = FetcherSettings {
        secret_name: "/tokyo-weather-api/openweathermap-api-key".to_string(),
        ttl_seconds: 3600,
        default_location: TOKYO.to_string(),
        endpoint: WeatherEndpoint::new("https://api.openweathermap.org/data/2.5/weather", "metric")
            .unwrap(),
    };

    let fetcher = CacheAsideFetcher::new(
        settings,
        secrets.clone(),
        store.clone(),
        origin.clone(),
    )
    .with_clock(clock.clone());

    Harness {
        fetcher,
        secrets,
        origin,
        store,
        clock,
    }
}

fn healthy() -> Harness {
    harness(
        RecordingSecrets::with_value("owm-key"),
        RecordingOrigin::serving(tokyo_payload()),
        FlakyStore::new(false, false),
    )
}

fn body(response: &kumo::fetcher::WeatherResponse) -> Value {
    serde_json::from_str(&response.body).unwrap()
}

// --- properties ---

#[tokio::test]
async fn test_fresh_hit_skips_secret_and_origin() {
    let h = healthy();
    h.store
        .put(CacheEntry::new(TOKYO, tokyo_payload(), h.clock.now(), 600))
        .await
        .unwrap();

    let response = h.fetcher.handle_request(None).await;

    assert_eq!(response.status, 200);
    assert_eq!(body(&response)["source"], "cache");
    assert_eq!(h.secrets.calls(), 0);
    assert_eq!(h.origin.calls(), 0);
    assert_eq!(h.fetcher.metrics().get_cache_hits(), 1);
}

#[tokio::test]
async fn test_stale_entry_is_refetched_and_rewritten() {
    let h = healthy();
    let mut stale = CacheEntry::new(TOKYO, json!({"name": "Old"}), h.clock.now(), 0);
    stale.expires_at = T; // expires_at == now is already stale
    h.store.put(stale).await.unwrap();
    h.store.puts.lock().unwrap().clear();

    let response = h.fetcher.handle_request(None).await;

    assert_eq!(response.status, 200);
    assert_eq!(body(&response)["source"], "api");
    assert_eq!(body(&response)["city"], "Tokyo");
    assert_eq!(h.origin.calls(), 1);

    let puts = h.store.puts.lock().unwrap();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].expires_at, T + 3600);
    assert_eq!(h.fetcher.metrics().get_cache_stale(), 1);
}

#[tokio::test]
async fn test_cache_read_failure_degrades_to_origin() {
    let h = harness(
        RecordingSecrets::with_value("owm-key"),
        RecordingOrigin::serving(tokyo_payload()),
        FlakyStore::new(true, false),
    );

    let response = h.fetcher.handle_request(None).await;

    assert_eq!(response.status, 200);
    assert_eq!(body(&response)["source"], "api");
    assert_eq!(h.origin.calls(), 1);
    assert_eq!(h.fetcher.metrics().get_cache_read_errors(), 1);
}

#[tokio::test]
async fn test_write_back_failure_is_ignored() {
    let h = harness(
        RecordingSecrets::with_value("owm-key"),
        RecordingOrigin::serving(tokyo_payload()),
        FlakyStore::new(false, true),
    );

    let response = h.fetcher.handle_request(None).await;

    assert_eq!(response.status, 200);
    assert_eq!(body(&response)["weather"]["description"], "broken clouds");
    assert_eq!(h.store.puts.lock().unwrap().len(), 1);
    assert_eq!(h.fetcher.metrics().get_cache_write_errors(), 1);
}

#[tokio::test]
async fn test_missing_credential_is_fatal_without_origin_call() {
    let h = harness(
        RecordingSecrets::default(),
        RecordingOrigin::serving(tokyo_payload()),
        FlakyStore::new(false, false),
    );

    let response = h.fetcher.handle_request(None).await;

    assert_eq!(response.status, 500);
    assert_eq!(
        body(&response),
        json!({
            "message": "Error fetching weather data",
            "error": "Failed to retrieve API key"
        })
    );
    assert_eq!(h.secrets.calls(), 1);
    assert_eq!(h.origin.calls(), 0);
    assert!(h.store.puts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_secret_backend_error_is_fatal() {
    let h = harness(
        RecordingSecrets {
            fail: true,
            ..Default::default()
        },
        RecordingOrigin::serving(tokyo_payload()),
        FlakyStore::new(false, false),
    );

    let err = h.fetcher.fetch(TOKYO).await.unwrap_err();

    assert!(matches!(err, FetchError::CredentialUnavailable { source: Some(_) }));
    assert_eq!(h.origin.calls(), 0);
}

#[tokio::test]
async fn test_origin_failure_is_fatal() {
    let h = harness(
        RecordingSecrets::with_value("owm-key"),
        RecordingOrigin::failing(),
        FlakyStore::new(false, false),
    );

    let response = h.fetcher.handle_request(None).await;

    assert_eq!(response.status, 500);
    assert_eq!(
        body(&response)["error"],
        "Failed to fetch weather data from OpenWeatherMap"
    );
    assert!(h.store.puts.lock().unwrap().is_empty());
    assert_eq!(h.fetcher.metrics().get_origin_failures(), 1);
}

#[tokio::test]
async fn test_stale_entry_is_not_served_when_origin_fails() {
    let h = harness(
        RecordingSecrets::with_value("owm-key"),
        RecordingOrigin::failing(),
        FlakyStore::new(false, false),
    );
    h.store
        .put(CacheEntry::new(TOKYO, tokyo_payload(), h.clock.now(), 60))
        .await
        .unwrap();
    h.clock.advance_seconds(120);

    let response = h.fetcher.handle_request(None).await;

    assert_eq!(response.status, 500);
    assert_eq!(h.origin.calls(), 1);
}

#[tokio::test]
async fn test_responses_carry_json_and_cors_headers() {
    let ok = healthy().fetcher.handle_request(None).await;
    let failed = harness(
        RecordingSecrets::default(),
        RecordingOrigin::failing(),
        FlakyStore::new(false, false),
    )
    .fetcher
    .handle_request(None)
    .await;

    for response in [ok, failed] {
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.header("Access-Control-Allow-Origin"), Some("*"));
    }
}

#[tokio::test]
async fn test_end_to_end_ttl_lifecycle() {
    let h = healthy();

    // T: miss
    let first = h.fetcher.handle_request(None).await;
    assert_eq!(first.status, 200);
    assert_eq!(body(&first)["source"], "api");
    assert_eq!(h.secrets.calls(), 1);
    assert_eq!(h.origin.calls(), 1);

    let url = h.origin.last_url();
    assert!(url.query_pairs().any(|(k, v)| k == "id" && v == TOKYO));
    assert!(url.query_pairs().any(|(k, v)| k == "appid" && v == "owm-key"));
    assert!(url.query_pairs().any(|(k, v)| k == "units" && v == "metric"));
    assert_eq!(h.store.puts.lock().unwrap()[0].expires_at, T + 3600);

    // T+1000: fresh hit
    h.clock.set_epoch_seconds(T + 1000);
    let second = h.fetcher.handle_request(None).await;
    assert_eq!(body(&second)["source"], "cache");
    assert_eq!(body(&second)["weather"], body(&first)["weather"]);
    assert_eq!(body(&second)["city"], body(&first)["city"]);
    assert_eq!(h.secrets.calls(), 1);
    assert_eq!(h.origin.calls(), 1);

    // T+4000: expired, refetched
    h.clock.set_epoch_seconds(T + 4000);
    h.origin.set_payload(Some(tokyo_payload()));
    let third = h.fetcher.handle_request(None).await;
    assert_eq!(body(&third)["source"], "api");
    assert_eq!(h.secrets.calls(), 2);
    assert_eq!(h.origin.calls(), 2);
    assert_eq!(h.store.puts.lock().unwrap()[1].expires_at, T + 4000 + 3600);
}

#[tokio::test]
async fn test_explicit_location_overrides_default() {
    let h = healthy();

    let result = h.fetcher.fetch("2643743").await.unwrap();

    assert_eq!(result.source, Source::Api);
    assert!(h
        .origin
        .last_url()
        .query_pairs()
        .any(|(k, v)| k == "id" && v == "2643743"));
    assert!(h.store.get("2643743").await.unwrap().is_some());
}

#[tokio::test]
async fn test_cached_payload_is_stored_verbatim() {
    let h = healthy();
    h.fetcher.handle_request(None).await;

    let entry = h.store.get(TOKYO).await.unwrap().unwrap();
    assert_eq!(entry.payload, tokyo_payload());
    assert!(entry.payload.get("cached").is_none());
}
