use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use super::classify::BlockVerdict;
use crate::error::FetchError;

const DEFAULT_DELAY_MS: u64 = 1_000;
const DEFAULT_TIMEOUT_MS: u64 = 20_000;

/// Escalation stage that produced (or last attempted) a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Priming,
    Baseline,
    Rotating,
    EnhancedBackends,
    BrowserRender,
}

impl Tier {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Priming => "priming",
            Self::Baseline => "baseline",
            Self::Rotating => "rotating",
            Self::EnhancedBackends => "enhanced",
            Self::BrowserRender => "browser",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cookie mapping sent with every attempt. Keys are unique, order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieJar(pub BTreeMap<String, String>);

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw `k=v; a=b` string as pasted from browser dev tools.
    ///
    /// Parts without `=` and parts with an empty key are dropped.
    pub fn parse(raw: &str) -> Self {
        let mut jar = BTreeMap::new();
        for part in raw.split(';') {
            if let Some((k, v)) = part.split_once('=') {
                let (k, v) = (k.trim(), v.trim());
                if !k.is_empty() {
                    jar.insert(k.to_string(), v.to_string());
                }
            }
        }
        Self(jar)
    }

    pub fn with(mut self, k: &str, v: &str) -> Self {
        self.0.insert(k.to_string(), v.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `k=v; a=b`, or `None` when nothing is worth sending.
    pub fn header_value(&self) -> Option<String> {
        let joined = self
            .0
            .iter()
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

/// One orchestrated fetch, read-only once built.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use tierfetch::tools::fetch::FetchRequest;
///
/// let request = FetchRequest::new("example.com/pricing")
///     .cookies_raw("session=abc; consent=yes")
///     .timeout(Duration::from_secs(10))
///     .prime_cookies(true)
///     .aggressive(true);
/// assert!(request.aggressive);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Raw target as typed; normalized and validated before any network call.
    pub url: String,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub cookies: CookieJar,
    pub proxy: Option<String>,
    /// Politeness pause before the first network call.
    pub delay: Duration,
    /// Per-attempt timeout for the HTTP tiers.
    pub timeout: Duration,
    pub prime_cookies: bool,
    pub aggressive: bool,
    pub use_browser: bool,
    /// CSS selector the browser tier waits for before scrolling.
    pub wait_selector: Option<String>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: None,
            referer: None,
            cookies: CookieJar::new(),
            proxy: None,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            prime_cookies: false,
            aggressive: false,
            use_browser: false,
            wait_selector: None,
        }
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = non_empty(ua.into());
        self
    }

    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = non_empty(referer.into());
        self
    }

    pub fn cookies(mut self, cookies: CookieJar) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn cookies_raw(mut self, raw: &str) -> Self {
        self.cookies = CookieJar::parse(raw);
        self
    }

    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = non_empty(proxy.into());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn prime_cookies(mut self, yes: bool) -> Self {
        self.prime_cookies = yes;
        self
    }

    pub fn aggressive(mut self, yes: bool) -> Self {
        self.aggressive = yes;
        self
    }

    pub fn use_browser(mut self, yes: bool) -> Self {
        self.use_browser = yes;
        self
    }

    pub fn wait_selector(mut self, selector: impl Into<String>) -> Self {
        self.wait_selector = non_empty(selector.into());
        self
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// A response as seen by the orchestrator, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub status: u16,
    /// Lowercase header names; repeated headers joined with `, `.
    pub headers: BTreeMap<String, String>,
    /// Full page markup.
    pub body: String,
    /// Post-redirect absolute URL, used to resolve relative links.
    pub final_url: String,
    /// Which tier/backend produced it, e.g. `baseline` or `enhanced:http2`.
    pub source: String,
}

impl FetchResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// 2xx or 3xx.
    pub fn is_http_ok(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

/// Result of a single backend call.
#[derive(Debug, Clone)]
pub enum TierOutcome {
    Success(FetchResponse),
    Blocked(FetchResponse),
    BackendUnavailable,
    TransportError(FetchError),
}

/// What a top-level fetch resolves to.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutcome {
    Success {
        response: FetchResponse,
        tier: Tier,
        attempts: usize,
    },
    Blocked {
        last_response: FetchResponse,
        verdict: BlockVerdict,
        last_tier: Tier,
        attempts: usize,
        hints: Vec<String>,
    },
    Failed {
        #[serde(serialize_with = "serialize_display")]
        cause: FetchError,
        last_tier: Option<Tier>,
        attempts: usize,
        hints: Vec<String>,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Network calls made, priming included.
    pub fn attempts(&self) -> usize {
        match self {
            Self::Success { attempts, .. }
            | Self::Blocked { attempts, .. }
            | Self::Failed { attempts, .. } => *attempts,
        }
    }

    /// Final response, clean or not.
    pub fn response(&self) -> Option<&FetchResponse> {
        match self {
            Self::Success { response, .. } => Some(response),
            Self::Blocked { last_response, .. } => Some(last_response),
            Self::Failed { .. } => None,
        }
    }

    /// Last known status code, if any response was obtained.
    pub fn status(&self) -> Option<u16> {
        self.response().map(|r| r.status)
    }

    /// Human-readable explanation for non-success outcomes.
    pub fn describe(&self) -> String {
        match self {
            Self::Success { tier, response, .. } => {
                format!("fetched via {tier} (status {})", response.status)
            }
            Self::Blocked {
                last_response,
                last_tier,
                hints,
                verdict,
                ..
            } => {
                let reason = if verdict.is_clean() {
                    "unsuccessful status".to_string()
                } else {
                    verdict.to_string()
                };
                format!(
                    "Request failed/blocked (status {}) after {last_tier} tier: {reason}. {}",
                    last_response.status,
                    hints.join(" | ")
                )
            }
            Self::Failed {
                cause,
                last_tier,
                hints,
                ..
            } => {
                let tier = last_tier.map(|t| t.name()).unwrap_or("none");
                format!(
                    "Request failed (status ?) after {tier} tier: {cause}. {}",
                    hints.join(" | ")
                )
            }
        }
    }
}

fn serialize_display<T: fmt::Display, S: Serializer>(
    value: &T,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
