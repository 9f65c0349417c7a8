use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload shape of a remote source, which selects the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// RSS/Atom XML
    Rss,
    /// A news listing page scraped out of HTML
    Html,
}

/// One remote news source, fixed at configuration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSource {
    /// Short identifier used in logs, metrics, and rendered output
    pub name: String,
    pub url: String,
    pub kind: ContentKind,
    /// Whether to try the source URL directly before the proxy tiers.
    /// Sources behind CORS-less hosts that also reject plain requests
    /// skip straight to the proxies.
    #[serde(default)]
    pub try_direct: bool,
}

/// One displayable news entry. Plain text throughout; no identity or
/// uniqueness beyond its position in the parsed list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsItem {
    pub title: String,
    pub summary: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub link: Option<String>,
}
