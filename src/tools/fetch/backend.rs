//! Interchangeable request engines behind one trait.
//!
//! A connector is probed once at startup and opened once per orchestrated
//! fetch; the session it returns owns its own cookie store, so concurrent
//! fetches never share connection or cookie state.

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::classify::classify;
use super::client::build_client;
use super::headers::headers_for_identity;
use super::identity::Identity;
use super::retry::RetryPolicy;
use super::types::{FetchResponse, TierOutcome};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// HTTP/1.1 pooled client over rustls.
    Baseline,
    /// Platform TLS stack, different ClientHello than rustls.
    TlsFingerprint,
    /// ALPN-negotiated HTTP/2.
    Http2,
    /// Chrome TLS + HTTP/2 emulation.
    Impersonate,
}

impl BackendKind {
    /// Order the enhanced tier tries its backends in.
    pub const ENHANCED_PRIORITY: [BackendKind; 3] = [
        BackendKind::TlsFingerprint,
        BackendKind::Http2,
        BackendKind::Impersonate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::TlsFingerprint => "tls_fingerprint",
            Self::Http2 => "http2",
            Self::Impersonate => "impersonate",
        }
    }

    /// Tag stamped on responses this backend produced.
    pub fn source(&self) -> String {
        match self {
            Self::Baseline => "baseline".to_string(),
            other => format!("enhanced:{}", other.name()),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One request as handed to a backend.
#[derive(Debug, Clone, Copy)]
pub struct Attempt<'a> {
    pub url: &'a Url,
    pub identity: &'a Identity,
    pub timeout: Duration,
}

/// An opened backend session, alive for one orchestrated fetch.
#[async_trait]
pub trait FetchBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// One logical request. Never panics or errors past this boundary:
    /// every failure is folded into a [`TierOutcome`].
    async fn fetch(&self, attempt: &Attempt<'_>) -> TierOutcome;
}

/// Factory for backend sessions.
pub trait BackendConnector: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Whether this backend can work in this build/environment.
    fn probe(&self) -> bool;

    /// Open a session with the proxy baked in.
    fn connect(&self, proxy: Option<&str>) -> Result<Box<dyn FetchBackend>>;
}

/// Connectors and probe results, computed once and shared by every fetch.
#[derive(Clone)]
pub struct BackendSet {
    connectors: BTreeMap<BackendKind, Arc<dyn BackendConnector>>,
}

impl BackendSet {
    /// Probe every connector and keep those that answer; later entries of
    /// the same kind replace earlier ones.
    pub fn probe(connectors: Vec<Arc<dyn BackendConnector>>) -> Self {
        let mut available = BTreeMap::new();
        for connector in connectors {
            let kind = connector.kind();
            if connector.probe() {
                available.insert(kind, connector);
            } else {
                debug!(backend = %kind, "backend capability absent");
            }
        }
        Self {
            connectors: available,
        }
    }

    pub fn get(&self, kind: BackendKind) -> Option<&Arc<dyn BackendConnector>> {
        self.connectors.get(&kind)
    }

    pub fn kinds(&self) -> BTreeSet<BackendKind> {
        self.connectors.keys().copied().collect()
    }

    /// Available enhanced backends, in priority order.
    pub fn enhanced(&self) -> impl Iterator<Item = &Arc<dyn BackendConnector>> + '_ {
        BackendKind::ENHANCED_PRIORITY
            .iter()
            .filter_map(move |kind| self.connectors.get(kind))
    }
}

impl fmt::Debug for BackendSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.connectors.keys()).finish()
    }
}

/// What this process can escalate to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub backends: BTreeSet<BackendKind>,
    pub browser: bool,
}

/// Connector for the reqwest-built backends (baseline, HTTP/2, platform TLS).
#[derive(Debug, Clone)]
pub struct ReqwestConnector {
    kind: BackendKind,
    retry: RetryPolicy,
}

impl ReqwestConnector {
    pub fn new(kind: BackendKind, retry: RetryPolicy) -> Self {
        Self { kind, retry }
    }

    pub fn baseline(retry: RetryPolicy) -> Self {
        Self::new(BackendKind::Baseline, retry)
    }
}

impl BackendConnector for ReqwestConnector {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn probe(&self) -> bool {
        build_client(self.kind, None).is_ok()
    }

    fn connect(&self, proxy: Option<&str>) -> Result<Box<dyn FetchBackend>> {
        let client = build_client(self.kind, proxy)?;
        // Transport retry belongs to the baseline client only; enhanced
        // backends get exactly one shot each.
        let retry = if self.kind == BackendKind::Baseline {
            self.retry.clone()
        } else {
            RetryPolicy::none()
        };
        Ok(Box::new(ReqwestBackend {
            kind: self.kind,
            client,
            retry,
        }))
    }
}

struct ReqwestBackend {
    kind: BackendKind,
    client: Client,
    retry: RetryPolicy,
}

#[async_trait]
impl FetchBackend for ReqwestBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn fetch(&self, attempt: &Attempt<'_>) -> TierOutcome {
        let headers = headers_for_identity(attempt.identity);
        let mut retry = 0;

        loop {
            let sent = self
                .client
                .get(attempt.url.clone())
                .headers(headers.clone())
                .timeout(attempt.timeout)
                .send()
                .await;

            let resp = match sent {
                Ok(resp) => resp,
                Err(e) => return TierOutcome::TransportError(e.into()),
            };

            let status = resp.status().as_u16();
            if self.retry.should_retry(&Method::GET, status, retry) {
                let retry_after = resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok());
                let wait = self.retry.backoff(retry, retry_after);
                debug!(backend = %self.kind, status, retry, wait_ms = wait.as_millis() as u64, "transient status, retrying");
                tokio::time::sleep(wait).await;
                retry += 1;
                continue;
            }

            return match read_response(resp, self.kind.source()).await {
                Ok(response) => into_outcome(response),
                Err(e) => TierOutcome::TransportError(e),
            };
        }
    }
}

async fn read_response(resp: reqwest::Response, source: String) -> Result<FetchResponse> {
    let status = resp.status().as_u16();
    let final_url = resp.url().to_string();

    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in resp.headers() {
        let Ok(value) = value.to_str() else { continue };
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    let body = resp.text().await?;

    Ok(FetchResponse {
        status,
        headers,
        body,
        final_url,
        source,
    })
}

/// Tag a response with the classifier's verdict.
pub(crate) fn into_outcome(response: FetchResponse) -> TierOutcome {
    if classify(response.status, &response.body).is_clean() {
        TierOutcome::Success(response)
    } else {
        TierOutcome::Blocked(response)
    }
}
