use std::net::IpAddr;

use thiserror::Error;
use url::Url;

/// Policy violations for configuration-supplied URLs.
#[derive(Debug, Error)]
pub enum UrlPolicyError {
    #[error("invalid URL: {0}")]
    Invalid(#[from] url::ParseError),
    #[error("unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("localhost is not a valid remote source")]
    Loopback,
    #[error("private address not allowed: {0}")]
    PrivateAddress(String),
}

/// Validates a configured source or proxy URL.
///
/// The aggregator fetches whatever the configuration names, so the
/// configuration is the place to refuse URLs that would turn it into an
/// internal-network client: only http/https, no loopback, no private
/// ranges. The fetcher itself performs no re-validation (tests point it at
/// loopback mock servers).
pub fn ensure_public_http_url(raw: &str) -> Result<Url, UrlPolicyError> {
    let parsed = Url::parse(raw)?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(UrlPolicyError::UnsupportedScheme(other.to_string())),
    }

    let Some(host) = parsed.host_str() else {
        return Ok(parsed);
    };
    if host.eq_ignore_ascii_case("localhost") {
        return Err(UrlPolicyError::Loopback);
    }

    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if let Ok(ip) = bare.parse::<IpAddr>() {
        if ip.is_loopback() {
            return Err(UrlPolicyError::Loopback);
        }
        if is_private(&ip) {
            return Err(UrlPolicyError::PrivateAddress(ip.to_string()));
        }
    }

    Ok(parsed)
}

fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local fc00::/7
                || (first & 0xffc0) == 0xfe80 // link local fe80::/10
        }
    }
}
