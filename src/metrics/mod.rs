// Metrics module - Prometheus-compatible metrics tracking
// Provides counters for the cache-aside path and the HTTP front end

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Metrics struct tracks counters for Prometheus export
/// Thread-safe via atomic operations and mutexes
pub struct Metrics {
    // Request counters
    request_count: AtomicU64,

    // Status code counters (e.g., 200, 404, 500)
    status_counts: Mutex<HashMap<u16, u64>>,

    // Cache lookup outcomes
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_stale: AtomicU64,
    cache_read_errors: AtomicU64,

    // Write-back outcomes
    cache_writes: AtomicU64,
    cache_write_errors: AtomicU64,

    // Origin path
    credential_failures: AtomicU64,
    origin_requests: AtomicU64,
    origin_failures: AtomicU64,
    formatting_failures: AtomicU64,

    // Origin latency tracking (stored in microseconds as u64)
    origin_latency_sum_us: AtomicU64,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Metrics {
            request_count: AtomicU64::new(0),
            status_counts: Mutex::new(HashMap::new()),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_stale: AtomicU64::new(0),
            cache_read_errors: AtomicU64::new(0),
            cache_writes: AtomicU64::new(0),
            cache_write_errors: AtomicU64::new(0),
            credential_failures: AtomicU64::new(0),
            origin_requests: AtomicU64::new(0),
            origin_failures: AtomicU64::new(0),
            formatting_failures: AtomicU64::new(0),
            origin_latency_sum_us: AtomicU64::new(0),
        }
    }

    /// Increment the total request count
    pub fn increment_request_count(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the count for a response status code
    pub fn increment_status_count(&self, status_code: u16) {
        if let Ok(mut counts) = self.status_counts.lock() {
            *counts.entry(status_code).or_insert(0) += 1;
        }
    }

    pub fn increment_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Entry found but expired (also counted as a miss)
    pub fn increment_cache_stale(&self) {
        self.cache_stale.fetch_add(1, Ordering::Relaxed);
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_read_error(&self) {
        self.cache_read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_write(&self) {
        self.cache_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_write_error(&self) {
        self.cache_write_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_credential_failure(&self) {
        self.credential_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one origin call and its latency
    pub fn record_origin_request(&self, duration_ms: f64) {
        self.origin_requests.fetch_add(1, Ordering::Relaxed);
        let micros = (duration_ms * 1000.0).max(0.0) as u64;
        self.origin_latency_sum_us
            .fetch_add(micros, Ordering::Relaxed);
    }

    pub fn increment_origin_failure(&self) {
        self.origin_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_formatting_failure(&self) {
        self.formatting_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn get_status_count(&self, status_code: u16) -> u64 {
        self.status_counts
            .lock()
            .ok()
            .and_then(|counts| counts.get(&status_code).copied())
            .unwrap_or(0)
    }

    pub fn get_cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn get_cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn get_cache_stale(&self) -> u64 {
        self.cache_stale.load(Ordering::Relaxed)
    }

    pub fn get_cache_read_errors(&self) -> u64 {
        self.cache_read_errors.load(Ordering::Relaxed)
    }

    pub fn get_cache_writes(&self) -> u64 {
        self.cache_writes.load(Ordering::Relaxed)
    }

    pub fn get_cache_write_errors(&self) -> u64 {
        self.cache_write_errors.load(Ordering::Relaxed)
    }

    pub fn get_credential_failures(&self) -> u64 {
        self.credential_failures.load(Ordering::Relaxed)
    }

    pub fn get_origin_requests(&self) -> u64 {
        self.origin_requests.load(Ordering::Relaxed)
    }

    pub fn get_origin_failures(&self) -> u64 {
        self.origin_failures.load(Ordering::Relaxed)
    }

    pub fn get_formatting_failures(&self) -> u64 {
        self.formatting_failures.load(Ordering::Relaxed)
    }

    /// Export all metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP http_requests_total Total number of HTTP requests received\n");
        output.push_str("# TYPE http_requests_total counter\n");
        output.push_str(&format!(
            "http_requests_total {}\n",
            self.request_count.load(Ordering::Relaxed)
        ));

        output.push_str("\n# HELP http_requests_by_status_total HTTP requests by status code\n");
        output.push_str("# TYPE http_requests_by_status_total counter\n");
        if let Ok(counts) = self.status_counts.lock() {
            let mut sorted: Vec<_> = counts.iter().collect();
            sorted.sort();
            for (status, count) in sorted {
                output.push_str(&format!(
                    "http_requests_by_status_total{{status=\"{}\"}} {}\n",
                    status, count
                ));
            }
        }

        output.push_str("\n# HELP kumo_cache_lookups_total Cache lookups by outcome\n");
        output.push_str("# TYPE kumo_cache_lookups_total counter\n");
        for (outcome, value) in [
            ("hit", &self.cache_hits),
            ("miss", &self.cache_misses),
            ("stale", &self.cache_stale),
            ("error", &self.cache_read_errors),
        ] {
            output.push_str(&format!(
                "kumo_cache_lookups_total{{outcome=\"{}\"}} {}\n",
                outcome,
                value.load(Ordering::Relaxed)
            ));
        }

        output.push_str("\n# HELP kumo_cache_writes_total Cache write-backs by outcome\n");
        output.push_str("# TYPE kumo_cache_writes_total counter\n");
        output.push_str(&format!(
            "kumo_cache_writes_total{{outcome=\"ok\"}} {}\n",
            self.cache_writes.load(Ordering::Relaxed)
        ));
        output.push_str(&format!(
            "kumo_cache_writes_total{{outcome=\"error\"}} {}\n",
            self.cache_write_errors.load(Ordering::Relaxed)
        ));

        output.push_str("\n# HELP kumo_origin_requests_total Requests sent to the weather origin\n");
        output.push_str("# TYPE kumo_origin_requests_total counter\n");
        output.push_str(&format!(
            "kumo_origin_requests_total {}\n",
            self.origin_requests.load(Ordering::Relaxed)
        ));

        output.push_str(
            "\n# HELP kumo_origin_request_duration_seconds_sum Total time spent waiting on the origin\n",
        );
        output.push_str("# TYPE kumo_origin_request_duration_seconds_sum counter\n");
        output.push_str(&format!(
            "kumo_origin_request_duration_seconds_sum {:.6}\n",
            self.origin_latency_sum_us.load(Ordering::Relaxed) as f64 / 1_000_000.0
        ));

        output.push_str("\n# HELP kumo_fetch_errors_total Fatal request errors by kind\n");
        output.push_str("# TYPE kumo_fetch_errors_total counter\n");
        for (kind, value) in [
            ("credential_unavailable", &self.credential_failures),
            ("origin_unavailable", &self.origin_failures),
            ("formatting_error", &self.formatting_failures),
        ] {
            output.push_str(&format!(
                "kumo_fetch_errors_total{{kind=\"{}\"}} {}\n",
                kind,
                value.load(Ordering::Relaxed)
            ));
        }

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
