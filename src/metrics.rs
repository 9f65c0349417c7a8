//! Passive load-performance metrics.
//!
//! The fetch/render pipeline accepts an optional [`MetricsSink`] and reports
//! every pipeline attempt to it directly — observation is explicit
//! instrumentation, not interception. Metrics are purely in-memory for the
//! process lifetime and never influence fetch behavior.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use crate::fetch::Provenance;

/// One settled pipeline attempt for one source.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub source: String,
    pub elapsed: Duration,
    pub success: bool,
    /// Which path produced the payload; `None` for failed attempts
    pub provenance: Option<Provenance>,
}

/// Capability the pipeline calls to report attempts.
pub trait MetricsSink: Send + Sync {
    fn record_attempt(&self, record: AttemptRecord);
}

/// Running stats for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub attempts: u64,
    pub successes: u64,
    pub total_ms: u64,
    pub avg_ms: u64,
    pub last_ms: u64,
    /// Success count per path ("direct", "proxy 0", ...)
    pub path_successes: HashMap<String, u64>,
}

/// In-memory [`MetricsSink`]: running count, average, last duration, and a
/// per-endpoint success tally per source. Resettable on demand.
#[derive(Debug, Default)]
pub struct FeedMetrics {
    inner: Mutex<HashMap<String, SourceStats>>,
}

impl FeedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stats per source name.
    pub fn snapshot(&self) -> HashMap<String, SourceStats> {
        self.inner
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn reset(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.clear();
        }
        tracing::debug!("load metrics reset");
    }
}

impl MetricsSink for FeedMetrics {
    fn record_attempt(&self, record: AttemptRecord) {
        // Metrics are observational only; a poisoned lock drops the sample
        let Ok(mut guard) = self.inner.lock() else {
            return;
        };
        let stats = guard.entry(record.source).or_default();

        let elapsed_ms = record.elapsed.as_millis() as u64;
        stats.attempts += 1;
        stats.total_ms += elapsed_ms;
        stats.avg_ms = stats.total_ms / stats.attempts;
        stats.last_ms = elapsed_ms;

        if record.success {
            stats.successes += 1;
            if let Some(provenance) = record.provenance {
                *stats
                    .path_successes
                    .entry(provenance.endpoint_label())
                    .or_default() += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(source: &str, ms: u64, success: bool, provenance: Option<Provenance>) -> AttemptRecord {
        AttemptRecord {
            source: source.to_string(),
            elapsed: Duration::from_millis(ms),
            success,
            provenance,
        }
    }

    #[test]
    fn test_running_average_and_last() {
        let metrics = FeedMetrics::new();
        metrics.record_attempt(record("stj", 100, true, Some(Provenance::Direct)));
        metrics.record_attempt(record("stj", 300, true, Some(Provenance::Raced(2))));

        let stats = &metrics.snapshot()["stj"];
        assert_eq!(stats.attempts, 2);
        assert_eq!(stats.successes, 2);
        assert_eq!(stats.total_ms, 400);
        assert_eq!(stats.avg_ms, 200);
        assert_eq!(stats.last_ms, 300);
    }

    #[test]
    fn test_per_endpoint_tally_merges_race_and_sequential() {
        let metrics = FeedMetrics::new();
        metrics.record_attempt(record("trt", 50, true, Some(Provenance::Raced(1))));
        metrics.record_attempt(record("trt", 60, true, Some(Provenance::Sequential(1))));
        metrics.record_attempt(record("trt", 70, true, Some(Provenance::Direct)));

        let stats = &metrics.snapshot()["trt"];
        assert_eq!(stats.path_successes["proxy 1"], 2);
        assert_eq!(stats.path_successes["direct"], 1);
    }

    #[test]
    fn test_failures_count_attempts_but_not_tally() {
        let metrics = FeedMetrics::new();
        metrics.record_attempt(record("stj", 80, false, None));

        let stats = &metrics.snapshot()["stj"];
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.successes, 0);
        assert!(stats.path_successes.is_empty());
    }

    #[test]
    fn test_sources_are_isolated() {
        let metrics = FeedMetrics::new();
        metrics.record_attempt(record("stj", 10, true, Some(Provenance::Direct)));
        metrics.record_attempt(record("trt", 20, false, None));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot["stj"].attempts, 1);
        assert_eq!(snapshot["trt"].attempts, 1);
        assert_eq!(snapshot["stj"].successes, 1);
        assert_eq!(snapshot["trt"].successes, 0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let metrics = FeedMetrics::new();
        metrics.record_attempt(record("stj", 10, true, Some(Provenance::Direct)));
        metrics.reset();
        assert!(metrics.snapshot().is_empty());
    }
}
