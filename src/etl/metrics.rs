//! Counters for extractor runs

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of [`ExtractorMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub runs: u64,
    pub failures: u64,
    pub records: u64,
}

/// Run, failure and record counters for extraction
///
/// Every observation is also forwarded to the `metrics` facade so an installed
/// recorder (Prometheus exporter, statsd, ...) sees it.
#[derive(Debug, Default)]
pub struct ExtractorMetrics {
    runs: AtomicU64,
    failures: AtomicU64,
    records: AtomicU64,
}

impl ExtractorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, extractor: &str, records: usize) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.records.fetch_add(records as u64, Ordering::Relaxed);
        metrics::counter!("dw_extractor_runs_total", "extractor" => extractor.to_string())
            .increment(1);
        metrics::counter!("dw_extractor_records_total", "extractor" => extractor.to_string())
            .increment(records as u64);
    }

    pub fn record_failure(&self, extractor: &str) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("dw_extractor_runs_total", "extractor" => extractor.to_string())
            .increment(1);
        metrics::counter!("dw_extractor_failures_total", "extractor" => extractor.to_string())
            .increment(1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = ExtractorMetrics::new();
        metrics.record_success("api", 10);
        metrics.record_failure("api");
        metrics.record_success("api", 5);

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                runs: 3,
                failures: 1,
                records: 15
            }
        );
    }
}
