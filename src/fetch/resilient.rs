use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;

use super::proxy::ProxyEndpoint;
use crate::feed::FeedSource;

/// Errors surfaced by a fetch attempt or by the full three-tier strategy.
///
/// Per-attempt failures (timeout, status, network, body problems) are
/// absorbed inside the tiers; only [`FetchError::AllSourcesExhausted`]
/// escapes to the caller, carrying the normalized per-attempt reasons.
#[derive(Debug, Error)]
pub enum FetchError {
    /// A request or phase exceeded its configured timeout
    #[error("request timed out")]
    Timeout,
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// The response completed but carried no usable payload
    #[error("empty response body")]
    EmptyBody,
    /// Response body exceeded the configured size limit
    #[error("response too large (over {0} bytes)")]
    BodyTooLarge(usize),
    /// Response body was not valid UTF-8
    #[error("response is not valid UTF-8")]
    InvalidUtf8,
    /// Terminal: direct attempt, proxy race, and sequential fallback all failed
    #[error("all sources exhausted: {0}")]
    AllSourcesExhausted(String),
}

/// Which path produced a successful payload. Diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// The source URL answered directly
    Direct,
    /// Proxy at this index won the parallel race
    Raced(usize),
    /// Proxy at this index succeeded during the sequential fallback
    Sequential(usize),
}

impl Provenance {
    /// Endpoint identity without the phase, for per-endpoint success tallies.
    pub fn endpoint_label(&self) -> String {
        match self {
            Provenance::Direct => "direct".to_string(),
            Provenance::Raced(idx) | Provenance::Sequential(idx) => format!("proxy {idx}"),
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Direct => write!(f, "direct"),
            Provenance::Raced(idx) => write!(f, "race proxy {idx}"),
            Provenance::Sequential(idx) => write!(f, "sequential proxy {idx}"),
        }
    }
}

/// Result of one logical load: the payload text plus where it came from.
#[derive(Debug)]
pub struct FetchOutcome {
    pub body: String,
    pub provenance: Provenance,
    pub elapsed: Duration,
}

/// Timeouts and limits for the fetch strategy.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Ceiling for every individual GET, in any tier
    pub request_timeout: Duration,
    /// Ceiling for the whole parallel race phase
    pub race_timeout: Duration,
    /// Maximum accepted response body size
    pub max_body_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(8),
            race_timeout: Duration::from_secs(10),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Three-tier fetcher: direct attempt, parallel proxy race, sequential
/// proxy fallback.
///
/// Stateless between calls; the proxy list and timeouts are read-only
/// configuration shared by every load cycle. One instance serves all
/// configured sources.
pub struct ResilientFetcher {
    client: reqwest::Client,
    proxies: Arc<Vec<ProxyEndpoint>>,
    config: FetchConfig,
}

impl ResilientFetcher {
    pub fn new(client: reqwest::Client, proxies: Vec<ProxyEndpoint>, config: FetchConfig) -> Self {
        Self {
            client,
            proxies: Arc::new(proxies),
            config,
        }
    }

    pub fn proxies(&self) -> &[ProxyEndpoint] {
        &self.proxies
    }

    /// Fetches the source's payload, never blocking past the configured
    /// ceilings.
    ///
    /// Tiers run in order: direct (if `source.try_direct`), parallel race
    /// across every proxy, then each proxy sequentially. The first HTTP
    /// success with a usable body wins and commits the outcome; in the race
    /// phase the losing in-flight requests are dropped, which cancels them.
    ///
    /// # Errors
    ///
    /// [`FetchError::AllSourcesExhausted`] once every tier has failed; the
    /// message aggregates each attempt's failure reason with its phase.
    pub async fn fetch(&self, source: &FeedSource) -> Result<FetchOutcome, FetchError> {
        let started = Instant::now();
        let mut reasons: Vec<String> = Vec::new();

        if source.try_direct {
            match self.attempt(&source.url).await {
                Ok(body) => {
                    tracing::debug!(
                        source = %source.name,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "direct fetch succeeded"
                    );
                    return Ok(FetchOutcome {
                        body,
                        provenance: Provenance::Direct,
                        elapsed: started.elapsed(),
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        source = %source.name,
                        error = %err,
                        "direct fetch failed, falling back to proxies"
                    );
                    reasons.push(format!("direct: {err}"));
                }
            }
        }

        if self.proxies.is_empty() {
            reasons.push("no proxy endpoints configured".to_string());
            return Err(FetchError::AllSourcesExhausted(reasons.join("; ")));
        }

        match self.race_proxies(&source.url).await {
            Ok((idx, body)) => {
                tracing::info!(
                    source = %source.name,
                    proxy = idx,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "proxy race succeeded"
                );
                return Ok(FetchOutcome {
                    body,
                    provenance: Provenance::Raced(idx),
                    elapsed: started.elapsed(),
                });
            }
            Err(err) => {
                tracing::warn!(
                    source = %source.name,
                    error = %err,
                    "proxy race failed, falling back to sequential attempts"
                );
                reasons.push(format!("race: {err}"));
            }
        }

        for (idx, proxy) in self.proxies.iter().enumerate() {
            match self.attempt(&proxy.request_url(&source.url)).await {
                Ok(body) => {
                    tracing::info!(
                        source = %source.name,
                        proxy = idx,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "sequential proxy attempt succeeded"
                    );
                    return Ok(FetchOutcome {
                        body,
                        provenance: Provenance::Sequential(idx),
                        elapsed: started.elapsed(),
                    });
                }
                Err(err) => {
                    tracing::debug!(
                        source = %source.name,
                        proxy = idx,
                        error = %err,
                        "sequential proxy attempt failed"
                    );
                    reasons.push(format!("proxy {idx}: {err}"));
                }
            }
        }

        Err(FetchError::AllSourcesExhausted(reasons.join("; ")))
    }

    /// Issues one GET per proxy concurrently and returns the first success.
    ///
    /// Failed attempts are discarded as they settle; the phase as a whole is
    /// bounded by `race_timeout`. Dropping the remaining futures on a win
    /// aborts their underlying requests.
    async fn race_proxies(&self, target: &str) -> Result<(usize, String), FetchError> {
        let mut attempts: FuturesUnordered<_> = self
            .proxies
            .iter()
            .enumerate()
            .map(|(idx, proxy)| {
                let url = proxy.request_url(target);
                async move { (idx, self.attempt(&url).await) }
            })
            .collect();

        let drain = async {
            let mut last_err: Option<FetchError> = None;
            while let Some((idx, result)) = attempts.next().await {
                match result {
                    Ok(body) => return Ok((idx, body)),
                    Err(err) => {
                        tracing::debug!(proxy = idx, error = %err, "proxy attempt lost the race");
                        last_err = Some(err);
                    }
                }
            }
            Err(last_err.unwrap_or(FetchError::Timeout))
        };

        match tokio::time::timeout(self.config.race_timeout, drain).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }

    /// One GET under the per-request timeout, with status and body checks.
    async fn attempt(&self, url: &str) -> Result<String, FetchError> {
        let response =
            tokio::time::timeout(self.config.request_timeout, self.client.get(url).send())
                .await
                .map_err(|_| FetchError::Timeout)?
                .map_err(FetchError::Network)?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        let body = read_limited_text(response, self.config.max_body_bytes).await?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }
        Ok(body)
    }
}

/// Streams the response body with a size cap instead of buffering blindly.
async fn read_limited_text(
    response: reqwest::Response,
    limit: usize,
) -> Result<String, FetchError> {
    // Fast path: trust Content-Length when present
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::BodyTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::BodyTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes).map_err(|_| FetchError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ContentKind;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> FetchConfig {
        FetchConfig {
            request_timeout: Duration::from_millis(500),
            race_timeout: Duration::from_millis(1500),
            max_body_bytes: 64 * 1024,
        }
    }

    fn source(url: String, try_direct: bool) -> FeedSource {
        FeedSource {
            name: "court".to_string(),
            url,
            kind: ContentKind::Rss,
            try_direct,
        }
    }

    /// Builds N proxy endpoints routed through distinct paths on one mock
    /// server, so each can be given its own latency and status.
    fn mock_proxies(server: &MockServer, count: usize) -> Vec<ProxyEndpoint> {
        (0..count)
            .map(|i| ProxyEndpoint::new(format!("{}/relay{}?target=", server.uri(), i)))
            .collect()
    }

    async fn mount_proxy(server: &MockServer, idx: usize, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/relay{idx}")))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_direct_success_short_circuits_proxies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<rss/>"))
            .mount(&server)
            .await;

        let fetcher = ResilientFetcher::new(
            reqwest::Client::new(),
            mock_proxies(&server, 2),
            test_config(),
        );
        let outcome = fetcher
            .fetch(&source(format!("{}/feed", server.uri()), true))
            .await
            .unwrap();

        assert_eq!(outcome.provenance, Provenance::Direct);
        assert_eq!(outcome.body, "<rss/>");
        // No proxy was contacted
        let hits = server.received_requests().await.unwrap();
        assert!(hits.iter().all(|r| r.url.path() == "/feed"));
    }

    #[tokio::test]
    async fn test_direct_failure_falls_back_to_race() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_proxy(&server, 0, ResponseTemplate::new(502)).await;
        mount_proxy(
            &server,
            1,
            ResponseTemplate::new(200).set_body_string("proxied"),
        )
        .await;

        let fetcher = ResilientFetcher::new(
            reqwest::Client::new(),
            mock_proxies(&server, 2),
            test_config(),
        );
        let outcome = fetcher
            .fetch(&source(format!("{}/feed", server.uri()), true))
            .await
            .unwrap();

        assert_eq!(outcome.provenance, Provenance::Raced(1));
        assert_eq!(outcome.body, "proxied");
    }

    #[tokio::test]
    async fn test_first_success_wins_regardless_of_list_order() {
        let server = MockServer::start().await;
        mount_proxy(
            &server,
            0,
            ResponseTemplate::new(200)
                .set_body_string("slow")
                .set_delay(Duration::from_millis(400)),
        )
        .await;
        mount_proxy(&server, 1, ResponseTemplate::new(500)).await;
        mount_proxy(
            &server,
            2,
            ResponseTemplate::new(200)
                .set_body_string("winner")
                .set_delay(Duration::from_millis(30)),
        )
        .await;
        mount_proxy(
            &server,
            3,
            ResponseTemplate::new(200)
                .set_body_string("also slow")
                .set_delay(Duration::from_millis(400)),
        )
        .await;

        let fetcher = ResilientFetcher::new(
            reqwest::Client::new(),
            mock_proxies(&server, 4),
            test_config(),
        );
        let outcome = fetcher
            .fetch(&source(format!("{}/feed", server.uri()), false))
            .await
            .unwrap();

        assert_eq!(outcome.provenance, Provenance::Raced(2));
        assert_eq!(outcome.body, "winner");
    }

    #[tokio::test]
    async fn test_race_failure_falls_back_to_sequential_in_order() {
        let server = MockServer::start().await;
        // Proxy 0 always fails; proxy 1 fails once (the race attempt), then
        // recovers for the sequential pass.
        mount_proxy(&server, 0, ResponseTemplate::new(503)).await;
        Mock::given(method("GET"))
            .and(path("/relay1"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_proxy(
            &server,
            1,
            ResponseTemplate::new(200).set_body_string("recovered"),
        )
        .await;

        let fetcher = ResilientFetcher::new(
            reqwest::Client::new(),
            mock_proxies(&server, 2),
            test_config(),
        );
        let outcome = fetcher
            .fetch(&source(format!("{}/feed", server.uri()), false))
            .await
            .unwrap();

        assert_eq!(outcome.provenance, Provenance::Sequential(1));
        assert_eq!(outcome.body, "recovered");
    }

    #[tokio::test]
    async fn test_all_tiers_exhausted_aggregates_reasons() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        for idx in 0..2 {
            mount_proxy(&server, idx, ResponseTemplate::new(502)).await;
        }

        let fetcher = ResilientFetcher::new(
            reqwest::Client::new(),
            mock_proxies(&server, 2),
            test_config(),
        );
        let err = fetcher
            .fetch(&source(format!("{}/feed", server.uri()), true))
            .await
            .unwrap_err();

        match err {
            FetchError::AllSourcesExhausted(reason) => {
                assert!(reason.contains("direct: HTTP error: status 404"));
                assert!(reason.contains("proxy 0"));
                assert!(reason.contains("proxy 1"));
            }
            other => panic!("expected AllSourcesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_per_request_timeout_is_enforced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let config = FetchConfig {
            request_timeout: Duration::from_millis(100),
            ..test_config()
        };
        let fetcher = ResilientFetcher::new(reqwest::Client::new(), Vec::new(), config);

        let started = Instant::now();
        let err = fetcher
            .fetch(&source(format!("{}/feed", server.uri()), true))
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(2));
        match err {
            FetchError::AllSourcesExhausted(reason) => {
                assert!(reason.contains("direct: request timed out"));
                assert!(reason.contains("no proxy endpoints configured"));
            }
            other => panic!("expected AllSourcesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_race_phase_timeout_moves_to_sequential() {
        let server = MockServer::start().await;
        // Every proxy takes far longer than the race timeout but less than
        // the per-request timeout, so the phase ceiling is what fires.
        for idx in 0..3 {
            mount_proxy(
                &server,
                idx,
                ResponseTemplate::new(200)
                    .set_body_string("eventually")
                    .set_delay(Duration::from_millis(300)),
            )
            .await;
        }

        let config = FetchConfig {
            request_timeout: Duration::from_millis(800),
            race_timeout: Duration::from_millis(50),
            ..test_config()
        };
        let fetcher =
            ResilientFetcher::new(reqwest::Client::new(), mock_proxies(&server, 3), config);
        let outcome = fetcher
            .fetch(&source(format!("{}/feed", server.uri()), false))
            .await
            .unwrap();

        // The sequential pass still reaches the same (slow but working) proxy
        assert_eq!(outcome.provenance, Provenance::Sequential(0));
        assert_eq!(outcome.body, "eventually");
    }

    #[tokio::test]
    async fn test_empty_body_counts_as_attempt_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string("   "))
            .mount(&server)
            .await;

        let fetcher = ResilientFetcher::new(reqwest::Client::new(), Vec::new(), test_config());
        let err = fetcher
            .fetch(&source(format!("{}/feed", server.uri()), true))
            .await
            .unwrap_err();

        match err {
            FetchError::AllSourcesExhausted(reason) => {
                assert!(reason.contains("empty response body"));
            }
            other => panic!("expected AllSourcesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(256)))
            .mount(&server)
            .await;

        let config = FetchConfig {
            max_body_bytes: 64,
            ..test_config()
        };
        let fetcher = ResilientFetcher::new(reqwest::Client::new(), Vec::new(), config);
        let err = fetcher
            .fetch(&source(format!("{}/feed", server.uri()), true))
            .await
            .unwrap_err();

        match err {
            FetchError::AllSourcesExhausted(reason) => {
                assert!(reason.contains("response too large"));
            }
            other => panic!("expected AllSourcesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_utf8_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xfe, 0x00]))
            .mount(&server)
            .await;

        let fetcher = ResilientFetcher::new(reqwest::Client::new(), Vec::new(), test_config());
        let err = fetcher
            .fetch(&source(format!("{}/feed", server.uri()), true))
            .await
            .unwrap_err();

        match err {
            FetchError::AllSourcesExhausted(reason) => {
                assert!(reason.contains("not valid UTF-8"));
            }
            other => panic!("expected AllSourcesExhausted, got {other:?}"),
        }
    }
}
