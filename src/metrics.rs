//! Observability metrics: recommendation latency, clamped and rejected requests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Number of latency samples kept by [`MetricsCollector::new`].
pub const DEFAULT_LATENCY_SAMPLES: usize = 1024;

/// Collects runtime metrics for a recommender.
///
/// All recording goes through atomics, so concurrent queries never wait on
/// each other. Latency is kept for the most recent queries only, in a
/// fixed-size ring.
#[derive(Debug)]
pub struct MetricsCollector {
    latency_samples_us: Box<[AtomicU64]>,
    total_queries: AtomicU64,
    clamped_queries: AtomicU64,
    rejected_queries: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LATENCY_SAMPLES)
    }

    /// Keep at most `capacity` latency samples (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            latency_samples_us: (0..capacity.max(1)).map(|_| AtomicU64::new(0)).collect(),
            total_queries: AtomicU64::new(0),
            clamped_queries: AtomicU64::new(0),
            rejected_queries: AtomicU64::new(0),
        }
    }

    /// Record a served query with its duration.
    ///
    /// Once the ring is full the oldest sample is overwritten.
    pub fn record_query(&self, duration: Duration) {
        let seq = self.total_queries.fetch_add(1, Ordering::Relaxed);
        let slot = (seq % self.capacity() as u64) as usize;
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.latency_samples_us[slot].store(micros, Ordering::Relaxed);
    }

    /// Record a query whose `top_k` was clamped to the corpus size.
    pub fn record_clamp(&self) {
        self.clamped_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a query that failed validation.
    pub fn record_rejection(&self) {
        self.rejected_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_queries(&self) -> u64 {
        self.total_queries.load(Ordering::Relaxed)
    }

    pub fn clamped_queries(&self) -> u64 {
        self.clamped_queries.load(Ordering::Relaxed)
    }

    pub fn rejected_queries(&self) -> u64 {
        self.rejected_queries.load(Ordering::Relaxed)
    }

    /// Maximum number of latency samples kept.
    pub fn capacity(&self) -> usize {
        self.latency_samples_us.len()
    }

    /// Number of latency samples currently held.
    pub fn sample_count(&self) -> usize {
        self.total_queries().min(self.capacity() as u64) as usize
    }

    fn latency_samples(&self) -> Vec<f64> {
        self.latency_samples_us[..self.sample_count()]
            .iter()
            .map(|s| s.load(Ordering::Relaxed) as f64)
            .collect()
    }

    /// Average query latency in microseconds over the held samples.
    pub fn avg_query_latency_us(&self) -> f64 {
        let samples = self.latency_samples();
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    /// Get a percentile of query latency (e.g., 50.0, 95.0, 99.0).
    pub fn percentile_query_latency_us(&self, percentile: f64) -> f64 {
        let mut sorted = self.latency_samples();
        if sorted.is_empty() {
            return 0.0;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        let index = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[index.min(sorted.len() - 1)]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counters() {
        let m = MetricsCollector::new();
        m.record_clamp();
        m.record_clamp();
        m.record_rejection();

        assert_eq!(m.clamped_queries(), 2);
        assert_eq!(m.rejected_queries(), 1);
        assert_eq!(m.total_queries(), 0);
        assert_eq!(m.sample_count(), 0);
    }

    #[test]
    fn test_metrics_latency() {
        let m = MetricsCollector::new();
        m.record_query(Duration::from_micros(100));
        m.record_query(Duration::from_micros(300));
        m.record_query(Duration::from_micros(200));

        assert_eq!(m.total_queries(), 3);
        assert_eq!(m.sample_count(), 3);
        assert!((m.avg_query_latency_us() - 200.0).abs() < 1.0);
        assert!((m.percentile_query_latency_us(50.0) - 200.0).abs() < 1.0);
        assert!((m.percentile_query_latency_us(100.0) - 300.0).abs() < 1.0);
    }

    #[test]
    fn test_samples_stay_bounded() {
        let m = MetricsCollector::with_capacity(4);
        for us in 1..=10 {
            m.record_query(Duration::from_micros(us * 100));
        }

        assert_eq!(m.total_queries(), 10);
        assert_eq!(m.capacity(), 4);
        assert_eq!(m.sample_count(), 4);
        // Only the last four queries (700..=1000us) remain.
        assert!((m.avg_query_latency_us() - 850.0).abs() < 1.0);
        assert!((m.percentile_query_latency_us(0.0) - 700.0).abs() < 1.0);
    }

    #[test]
    fn test_zero_capacity_keeps_one_sample() {
        let m = MetricsCollector::with_capacity(0);
        m.record_query(Duration::from_micros(5));
        m.record_query(Duration::from_micros(9));
        assert_eq!(m.sample_count(), 1);
        assert!((m.avg_query_latency_us() - 9.0).abs() < 1.0);
    }

    #[test]
    fn test_concurrent_recording() {
        let m = MetricsCollector::with_capacity(16);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..100 {
                        m.record_query(Duration::from_micros(10));
                        m.record_clamp();
                    }
                });
            }
        });

        assert_eq!(m.total_queries(), 400);
        assert_eq!(m.clamped_queries(), 400);
        assert_eq!(m.sample_count(), 16);
        assert!((m.avg_query_latency_us() - 10.0).abs() < 1.0);
    }

    #[test]
    fn test_metrics_empty() {
        let m = MetricsCollector::new();
        assert_eq!(m.avg_query_latency_us(), 0.0);
        assert_eq!(m.percentile_query_latency_us(99.0), 0.0);
    }
}
