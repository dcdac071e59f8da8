use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Global metrics collector for the application.
///
/// Tracks request outcomes, emitted detections, and synthesis health.
/// Thread-safe and can be shared across the application.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    requests_total: AtomicUsize,
    requests_failed: AtomicUsize,
    detections_emitted: AtomicUsize,
    synthesis_calls: AtomicUsize,
    synthesis_failures: AtomicUsize,
    request_latency_ms: RwLock<Vec<u64>>,
    start_time: Instant,
}

/// Point-in-time view of the collected metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: usize,
    pub requests_failed: usize,
    pub detections_emitted: usize,
    pub synthesis_calls: usize,
    pub synthesis_failures: usize,
    pub request_latency_avg_ms: u64,
    pub uptime_seconds: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                requests_total: AtomicUsize::new(0),
                requests_failed: AtomicUsize::new(0),
                detections_emitted: AtomicUsize::new(0),
                synthesis_calls: AtomicUsize::new(0),
                synthesis_failures: AtomicUsize::new(0),
                request_latency_ms: RwLock::new(Vec::new()),
                start_time: Instant::now(),
            }),
        }
    }

    pub fn record_request(&self, success: bool, duration: Duration, detections: usize) {
        self.inner.requests_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.inner.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner
            .detections_emitted
            .fetch_add(detections, Ordering::Relaxed);
        self.inner
            .request_latency_ms
            .write()
            .push(duration.as_millis() as u64);
    }

    pub fn record_synthesis(&self, success: bool) {
        self.inner.synthesis_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.inner.synthesis_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let latencies = self.inner.request_latency_ms.read();
        MetricsSnapshot {
            requests_total: self.inner.requests_total.load(Ordering::Relaxed),
            requests_failed: self.inner.requests_failed.load(Ordering::Relaxed),
            detections_emitted: self.inner.detections_emitted.load(Ordering::Relaxed),
            synthesis_calls: self.inner.synthesis_calls.load(Ordering::Relaxed),
            synthesis_failures: self.inner.synthesis_failures.load(Ordering::Relaxed),
            request_latency_avg_ms: avg(&latencies),
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Render the metrics in Prometheus text exposition format
    pub fn to_prometheus(&self) -> String {
        let s = self.snapshot();
        format!(
            "# TYPE requests_total counter\n\
             requests_total {}\n\
             # TYPE requests_failed counter\n\
             requests_failed {}\n\
             # TYPE detections_emitted counter\n\
             detections_emitted {}\n\
             # TYPE synthesis_calls counter\n\
             synthesis_calls {}\n\
             # TYPE synthesis_failures counter\n\
             synthesis_failures {}\n\
             # TYPE request_latency_avg_ms gauge\n\
             request_latency_avg_ms {}\n\
             # TYPE uptime_seconds counter\n\
             uptime_seconds {}\n",
            s.requests_total,
            s.requests_failed,
            s.detections_emitted,
            s.synthesis_calls,
            s.synthesis_failures,
            s.request_latency_avg_ms,
            s.uptime_seconds,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = Metrics::new();

        metrics.record_request(true, Duration::from_millis(120), 2);
        metrics.record_request(false, Duration::from_millis(40), 0);
        metrics.record_synthesis(true);
        metrics.record_synthesis(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests_total, 2);
        assert_eq!(snapshot.requests_failed, 1);
        assert_eq!(snapshot.detections_emitted, 2);
        assert_eq!(snapshot.synthesis_calls, 2);
        assert_eq!(snapshot.synthesis_failures, 1);
        assert_eq!(snapshot.request_latency_avg_ms, 80);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.record_request(true, Duration::from_millis(100), 3);

        let prometheus = metrics.to_prometheus();
        assert!(prometheus.contains("requests_total 1"));
        assert!(prometheus.contains("detections_emitted 3"));
    }
}
