//! The per-source load cycle.
//!
//! A [`FeedWatcher`] owns everything between "time to refresh" and "state on
//! screen" for one source: it runs the fetch+parse pipeline, retries the
//! whole pipeline a bounded number of times with exponential backoff, emits
//! display states over a channel, and re-runs on a fixed interval.
//!
//! Cycle isolation: each load cycle claims a fresh id from a monotonically
//! increasing counter, and an event is only emitted while its cycle is still
//! the latest one initiated. A slow cycle that is overtaken by the next
//! scheduled tick settles silently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::parser::parse_items;
use super::source::{FeedSource, NewsItem};
use crate::fetch::ResilientFetcher;
use crate::metrics::{AttemptRecord, MetricsSink};

/// Retry, refresh, and display policy for a watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Automatic retries after the first failed pipeline attempt
    pub max_retries: u32,
    /// Backoff multiplier; retry n waits `backoff_unit * base^n`
    pub backoff_base: f64,
    /// Backoff time unit (one second in production; tests shrink it)
    pub backoff_unit: Duration,
    pub refresh_interval: Duration,
    /// Display cap applied to the parsed item list
    pub display_limit: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base: 1.5,
            backoff_unit: Duration::from_secs(1),
            refresh_interval: Duration::from_secs(30 * 60),
            display_limit: 12,
        }
    }
}

/// Display state of a widget. Exactly one terminal state (`Ready` or
/// `Failed`) is reached per cycle; `Ready` with an empty list is the
/// "no items" rendering, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetState {
    Loading,
    Ready(Vec<NewsItem>),
    RetryScheduled {
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    Failed {
        reason: String,
    },
}

/// A state change for one source's widget.
#[derive(Debug, Clone)]
pub struct WidgetEvent {
    pub source: Arc<FeedSource>,
    pub cycle: u64,
    pub state: WidgetState,
}

/// Runs load cycles for a single source. Each source gets its own watcher;
/// watchers share nothing but the fetcher and its read-only configuration.
pub struct FeedWatcher {
    source: Arc<FeedSource>,
    fetcher: Arc<ResilientFetcher>,
    config: WatcherConfig,
    metrics: Option<Arc<dyn MetricsSink>>,
    events: mpsc::Sender<WidgetEvent>,
    latest_cycle: AtomicU64,
}

impl FeedWatcher {
    pub fn new(
        source: FeedSource,
        fetcher: Arc<ResilientFetcher>,
        config: WatcherConfig,
        metrics: Option<Arc<dyn MetricsSink>>,
        events: mpsc::Sender<WidgetEvent>,
    ) -> Self {
        Self {
            source: Arc::new(source),
            fetcher,
            config,
            metrics,
            events,
            latest_cycle: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> &FeedSource {
        &self.source
    }

    /// Runs forever: one cycle immediately, then one per refresh tick.
    /// Stops when the event channel has no receiver left.
    pub async fn run(&self) {
        // interval() panics on a zero period; a configured 0 gets a floor
        let period = self.config.refresh_interval.max(Duration::from_secs(60));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.run_cycle().await;
            if self.events.is_closed() {
                tracing::debug!(source = %self.source.name, "event channel closed, stopping watcher");
                return;
            }
        }
    }

    /// Runs one complete load cycle: fetch + parse, with up to
    /// `max_retries` full-pipeline retries, and returns the terminal state.
    pub async fn run_cycle(&self) -> WidgetState {
        let cycle = self.latest_cycle.fetch_add(1, Ordering::SeqCst) + 1;
        self.emit(cycle, WidgetState::Loading).await;

        let mut attempt: u32 = 0;
        loop {
            let started = Instant::now();
            match self.fetcher.fetch(&self.source).await {
                Ok(outcome) => {
                    self.record(started.elapsed(), true, Some(outcome.provenance));

                    let mut items = parse_items(&outcome.body, self.source.kind);
                    items.truncate(self.config.display_limit);
                    tracing::info!(
                        source = %self.source.name,
                        items = items.len(),
                        provenance = %outcome.provenance,
                        elapsed_ms = outcome.elapsed.as_millis() as u64,
                        "load cycle complete"
                    );

                    let state = WidgetState::Ready(items);
                    self.emit(cycle, state.clone()).await;
                    return state;
                }
                Err(err) => {
                    self.record(started.elapsed(), false, None);

                    if attempt < self.config.max_retries {
                        attempt += 1;
                        let delay = self.backoff_delay(attempt);
                        tracing::warn!(
                            source = %self.source.name,
                            attempt,
                            max = self.config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "load cycle failed, retrying"
                        );
                        self.emit(
                            cycle,
                            WidgetState::RetryScheduled {
                                attempt,
                                delay,
                                reason: err.to_string(),
                            },
                        )
                        .await;
                        tokio::time::sleep(delay).await;
                    } else {
                        tracing::error!(
                            source = %self.source.name,
                            error = %err,
                            "load cycle failed after all retries"
                        );
                        let state = WidgetState::Failed {
                            reason: err.to_string(),
                        };
                        self.emit(cycle, state.clone()).await;
                        return state;
                    }
                }
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.config
            .backoff_unit
            .mul_f64(self.config.backoff_base.powi(attempt as i32))
    }

    async fn emit(&self, cycle: u64, state: WidgetState) {
        // Only the most recently initiated cycle may render
        if self.latest_cycle.load(Ordering::SeqCst) != cycle {
            tracing::debug!(
                source = %self.source.name,
                cycle,
                "discarding state from superseded cycle"
            );
            return;
        }

        let event = WidgetEvent {
            source: Arc::clone(&self.source),
            cycle,
            state,
        };
        if self.events.send(event).await.is_err() {
            tracing::debug!(source = %self.source.name, "event receiver dropped");
        }
    }

    fn record(&self, elapsed: Duration, success: bool, provenance: Option<crate::fetch::Provenance>) {
        if let Some(metrics) = &self.metrics {
            metrics.record_attempt(AttemptRecord {
                source: self.source.name.clone(),
                elapsed,
                success,
                provenance,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule_matches_documented_delays() {
        let watcher_config = WatcherConfig::default();
        let source = FeedSource {
            name: "stj".to_string(),
            url: "https://court.example/rss".to_string(),
            kind: crate::feed::ContentKind::Rss,
            try_direct: true,
        };
        let (tx, _rx) = mpsc::channel(8);
        let watcher = FeedWatcher::new(
            source,
            Arc::new(ResilientFetcher::new(
                reqwest::Client::new(),
                Vec::new(),
                crate::fetch::FetchConfig::default(),
            )),
            watcher_config,
            None,
            tx,
        );

        assert_eq!(watcher.backoff_delay(1), Duration::from_millis(1500));
        assert_eq!(watcher.backoff_delay(2), Duration::from_millis(2250));
    }
}
