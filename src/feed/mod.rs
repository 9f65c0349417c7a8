//! Feed sources, content parsing, and the per-source load cycle.
//!
//! A [`FeedSource`] describes one remote news source (URL, payload kind,
//! whether a direct fetch is attempted before the proxy tiers). The
//! [`parser`] turns fetched text into [`NewsItem`]s and never fails — an
//! unusable payload is an empty list, not an error. A [`FeedWatcher`] owns
//! the full load cycle for one source: fetch, parse, bounded retry with
//! backoff, scheduled refresh, and state events for the renderer.

pub mod parser;
mod source;
mod watcher;

pub use source::{ContentKind, FeedSource, NewsItem};
pub use watcher::{FeedWatcher, WatcherConfig, WidgetEvent, WidgetState};
