use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Relay mirrors used to reach sources that are unreachable directly.
///
/// Any mirror may be down, rate-limited, or serve garbage at any time; the
/// list exists precisely so that no single mirror is load-bearing.
const DEFAULT_PROXY_PREFIXES: &[&str] = &[
    "https://api.allorigins.win/raw?url=",
    "https://cors-anywhere.herokuapp.com/",
    "https://thingproxy.freeboard.io/fetch/",
    "https://cors.bridged.cc/",
    "https://api.codetabs.com/v1/proxy?quest=",
];

/// Percent-encoding set equivalent to JavaScript's `encodeURIComponent`:
/// alphanumerics plus `- _ . ! ~ * ' ( )` pass through, everything else is
/// escaped. The mirrors expect the target URL encoded this way.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// One relay mirror: a URL prefix the encoded target URL is appended to.
///
/// Stateless and fixed at configuration time. Identity within a fetch is the
/// endpoint's position in the configured list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    prefix: String,
}

impl ProxyEndpoint {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Builds the full request URL for a target resource:
    /// prefix + percent-encoded target.
    pub fn request_url(&self, target: &str) -> String {
        format!(
            "{}{}",
            self.prefix,
            utf8_percent_encode(target, URI_COMPONENT)
        )
    }
}

/// The built-in mirror list, in priority order.
pub fn default_proxies() -> Vec<ProxyEndpoint> {
    DEFAULT_PROXY_PREFIXES
        .iter()
        .copied()
        .map(ProxyEndpoint::new)
        .collect()
}
