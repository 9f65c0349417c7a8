//! Resilient content fetching over unreliable third-party endpoints.
//!
//! The upstream court sites do not serve CORS headers and are frequently
//! slow or unreachable, so every load goes through a three-tier strategy:
//!
//! 1. **Direct** — plain GET against the source URL (only for sources
//!    configured with `try_direct`)
//! 2. **Proxy race** — one GET per relay mirror, first success wins
//! 3. **Sequential fallback** — the same mirrors, one at a time, in order
//!
//! Each tier is bounded by a per-request timeout, the race additionally by
//! a phase timeout. [`ResilientFetcher`] implements the strategy;
//! [`ProxyEndpoint`] models one relay mirror.

mod proxy;
mod resilient;

pub use proxy::{default_proxies, ProxyEndpoint};
pub use resilient::{FetchConfig, FetchError, FetchOutcome, Provenance, ResilientFetcher};
