//! Resilient court-news aggregation.
//!
//! The crate watches a small set of third-party court-news sources (an RSS
//! feed and an HTML listing) whose hosts are slow, CORS-less, and generally
//! unreliable. Every load goes through a three-tier fetch strategy — direct
//! attempt, parallel race across relay mirrors, sequential fallback — with
//! bounded whole-pipeline retries, a fixed refresh schedule, and passive
//! load metrics.
//!
//! Module map:
//!
//! - [`fetch`] — the three-tier [`fetch::ResilientFetcher`] and the proxy
//!   mirror list
//! - [`feed`] — sources, payload parsing, and the per-source
//!   [`feed::FeedWatcher`] load cycle
//! - [`metrics`] — the [`metrics::MetricsSink`] capability and its in-memory
//!   implementation
//! - [`render`] — widget states as terminal cards or JSON lines
//! - [`config`] — optional TOML configuration over production defaults
//! - [`util`] — URL policy and text hygiene

pub mod config;
pub mod feed;
pub mod fetch;
pub mod metrics;
pub mod render;
pub mod util;
