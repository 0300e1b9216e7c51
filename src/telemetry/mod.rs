//! Telemetry for the policy client.
//!
//! Counters are kept per client and read through
//! [`PolicyClient::metrics`](crate::PolicyClient::metrics). Log output goes
//! through `tracing`; the library never installs a subscriber itself, use
//! [`init_logging`] from binaries.

use crate::{Error, Result};

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Per-client counters.
#[derive(Debug, Default)]
pub(crate) struct Telemetry {
    queries: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    requests: AtomicU64,
    errors: AtomicU64,
    total_request_time_us: AtomicU64,
}

impl Telemetry {
    pub(crate) fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_request(&self, duration_ms: f64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let duration_us = (duration_ms * 1000.0) as u64;
        self.total_request_time_us
            .fetch_add(duration_us, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self, _error: &Error) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn metrics(&self) -> ClientMetrics {
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let cache_total = cache_hits + cache_misses;
        let cache_hit_rate = if cache_total > 0 {
            (cache_hits as f64 / cache_total as f64) * 100.0
        } else {
            0.0
        };

        let requests = self.requests.load(Ordering::Relaxed);
        let total_time_us = self.total_request_time_us.load(Ordering::Relaxed);
        let avg_request_time_ms = if requests > 0 {
            (total_time_us as f64 / requests as f64) / 1000.0
        } else {
            0.0
        };

        ClientMetrics {
            queries: self.queries.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            cache_hit_rate,
            requests,
            avg_request_time_ms,
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of client counters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClientMetrics {
    /// Number of `query` calls, including those made by `assert` and `evaluate`
    pub queries: u64,
    /// Queries answered from the cache
    pub cache_hits: u64,
    /// Queries that had to go to the service while a cache was attached
    pub cache_misses: u64,
    /// Cache hit rate percentage
    pub cache_hit_rate: f64,
    /// Requests handed to the transport
    pub requests: u64,
    /// Average round trip in milliseconds
    pub avg_request_time_ms: f64,
    /// Failed calls of any kind
    pub errors: u64,
}

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| Error::config(format!("Failed to set logging subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_query_flow() {
        let telemetry = Telemetry::default();

        telemetry.record_query();
        telemetry.record_cache(false);
        telemetry.record_request(4.0);

        telemetry.record_query();
        telemetry.record_cache(true);

        telemetry.record_query();
        telemetry.record_cache(false);
        telemetry.record_request(2.0);
        telemetry.record_error(&Error::server("r", None));

        let metrics = telemetry.metrics();
        assert_eq!(metrics.queries, 3);
        assert_eq!(metrics.cache_hits, 1);
        assert_eq!(metrics.cache_misses, 2);
        assert_eq!(metrics.requests, 2);
        assert_eq!(metrics.errors, 1);
        assert!((metrics.avg_request_time_ms - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = Telemetry::default().metrics();
        assert_eq!(metrics.queries, 0);
        assert_eq!(metrics.cache_hit_rate, 0.0);
        assert_eq!(metrics.avg_request_time_ms, 0.0);
    }

    #[test]
    fn test_init_logging_only_once() {
        assert!(init_logging("debug", false).is_ok());
        assert!(init_logging("info", true).is_err());
    }
}
