//! Metrics hooks for the invoice image cache.
//!
//! Implement [`CacheMetrics`] to feed cache behavior into your monitoring
//! system:
//!
//! ```ignore
//! use hka_receipt::observability::CacheMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_hit(&self, _invoice: &str, _duration: Duration) {
//!         // counter!("hka_image_cache_hits").inc();
//!     }
//! }
//!
//! // let cache = ImageCache::new(backend)
//! //     .with_metrics(Box::new(PrometheusMetrics));
//! ```
//!
//! The trait's default methods log through the `log` crate. [`NoOpMetrics`],
//! the cache default, discards everything.
//!
//! # Hooks
//!
//! - `record_hit()` - image served from the store
//! - `record_miss()` - nothing stored, a fetch will run or be joined
//! - `record_join()` - caller attached to a fetch already in flight
//! - `record_fetch()` - the fetcher finished (successfully or not)
//! - `record_error()` - the fetch failed

use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// Record a cache hit.
    fn record_hit(&self, invoice: &str, duration: Duration) {
        debug!("Image cache HIT: {} took {:?}", invoice, duration);
    }

    /// Record a cache miss.
    fn record_miss(&self, invoice: &str) {
        debug!("Image cache MISS: {}", invoice);
    }

    /// Record a caller joining a fetch already in flight.
    fn record_join(&self, invoice: &str) {
        debug!("Image cache JOIN: {}", invoice);
    }

    /// Record a completed fetcher call. `stored` is false when nothing was cached.
    fn record_fetch(&self, invoice: &str, duration: Duration, stored: bool) {
        debug!(
            "Image cache FETCH: {} took {:?} (stored: {})",
            invoice, duration, stored
        );
    }

    /// Record an error.
    fn record_error(&self, invoice: &str, error: &str) {
        warn!("Image cache ERROR for {}: {}", invoice, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _invoice: &str, _duration: Duration) {}
    fn record_miss(&self, _invoice: &str) {}
    fn record_join(&self, _invoice: &str) {}
    fn record_fetch(&self, _invoice: &str, _duration: Duration, _stored: bool) {}
    fn record_error(&self, _invoice: &str, _error: &str) {}
}

/// Metrics that only log, using the trait defaults.
#[derive(Clone, Default)]
pub struct LogMetrics;

impl CacheMetrics for LogMetrics {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_metrics() {
        let metrics = NoOpMetrics;
        metrics.record_hit("77", Duration::from_millis(1));
        metrics.record_miss("77");
        metrics.record_fetch("77", Duration::from_millis(5), true);
    }

    #[test]
    fn test_log_metrics_defaults() {
        let metrics = LogMetrics;
        metrics.record_join("77");
        metrics.record_error("77", "boom");
    }
}
