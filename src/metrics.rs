//! Request-level metrics for the prediction endpoints.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Counters and latency samples for the serving process.
pub struct ServiceMetrics {
    /// Predictions served (both modes)
    pub predictions_served: AtomicU64,
    /// Predictions flagged as fraud
    pub fraud_flagged: AtomicU64,
    /// Feature-store lookups that degraded to request-supplied values
    pub feast_fallbacks: AtomicU64,
    /// Prediction failures surfaced to callers
    pub prediction_failures: AtomicU64,
    /// Handler latencies in microseconds
    latencies: RwLock<Vec<u64>>,
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            predictions_served: AtomicU64::new(0),
            fraud_flagged: AtomicU64::new(0),
            feast_fallbacks: AtomicU64::new(0),
            prediction_failures: AtomicU64::new(0),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    pub fn record_prediction(&self, latency: Duration, is_fraud: bool) {
        self.predictions_served.fetch_add(1, Ordering::Relaxed);
        if is_fraud {
            self.fraud_flagged.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut latencies) = self.latencies.write() {
            latencies.push(latency.as_micros() as u64);
            // Bound memory under sustained load
            if latencies.len() > 10000 {
                latencies.drain(0..5000);
            }
        }
    }

    pub fn record_fallback(&self) {
        self.feast_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.prediction_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_latency_stats(&self) -> LatencyStats {
        let latencies = self.latencies.read().unwrap();
        if latencies.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = latencies.clone();
        sorted.sort();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
        }
    }

    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.predictions_served.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Log a one-line summary of the counters and latency percentiles.
    pub fn log_summary(&self) {
        let stats = self.get_latency_stats();
        info!(
            predictions = self.predictions_served.load(Ordering::Relaxed),
            fraud_flagged = self.fraud_flagged.load(Ordering::Relaxed),
            feast_fallbacks = self.feast_fallbacks.load(Ordering::Relaxed),
            failures = self.prediction_failures.load(Ordering::Relaxed),
            throughput = format!("{:.1} req/s", self.get_throughput()),
            latency_mean_us = stats.mean_us,
            latency_p95_us = stats.p95_us,
            latency_p99_us = stats.p99_us,
            "Serving metrics"
        );
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency percentile summary
#[derive(Debug, Default)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
}

/// Periodic reporter task that logs the summary at a fixed interval.
pub struct MetricsReporter {
    metrics: std::sync::Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.log_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = ServiceMetrics::new();

        metrics.record_prediction(Duration::from_micros(100), false);
        metrics.record_prediction(Duration::from_micros(300), true);
        metrics.record_fallback();

        assert_eq!(metrics.predictions_served.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.fraud_flagged.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.feast_fallbacks.load(Ordering::Relaxed), 1);

        let stats = metrics.get_latency_stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.mean_us, 200);
    }

    #[test]
    fn test_empty_latency_stats() {
        let metrics = ServiceMetrics::new();
        assert_eq!(metrics.get_latency_stats().count, 0);
    }
}
