//! Browser tier: a real rendering engine, launched fresh for every call.
//!
//! [`BrowserRenderer`] owns the rendering algorithm (fragment stripping,
//! cookie injection, stealth patch, sub-timeouts, scroll) and drives any
//! [`BrowserEngine`]. The engine is always closed before `render` returns,
//! whether the page rendered, failed, timed out or panicked.

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::identity::Identity;
use super::types::FetchResponse;
use crate::error::{FetchError, Result};

#[cfg(feature = "browser")]
mod chromium;
#[cfg(test)]
mod tests;

#[cfg(feature = "browser")]
pub use chromium::{find_chromium, ChromiumEngine};

/// Hides the automation marker the engine exposes by default.
pub const STEALTH_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: true });";

/// One synthetic scroll to trigger lazy-loaded content.
pub const SCROLL_SCRIPT: &str = "window.scrollBy(0, document.body.scrollHeight / 2)";

/// Subresource types never downloaded while rendering.
pub const BLOCKED_RESOURCES: [ResourceKind; 4] = [
    ResourceKind::Image,
    ResourceKind::Media,
    ResourceKind::Font,
    ResourceKind::Stylesheet,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Image,
    Media,
    Font,
    Stylesheet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Pause after DOM content loaded, before scrolling.
    pub settle_ms: u64,
    /// Pause after the scroll, before reading the markup.
    pub scroll_settle_ms: u64,
    pub content_loaded_timeout_ms: u64,
    pub selector_timeout_ms: u64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub locale: String,
    /// Explicit engine binary; otherwise `TIERFETCH_CHROME`, then `PATH`.
    pub chrome_executable: Option<PathBuf>,
    /// Bound on shutting the engine down once rendering is over.
    pub close_timeout_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            settle_ms: 800,
            scroll_settle_ms: 500,
            content_loaded_timeout_ms: 20_000,
            selector_timeout_ms: 8_000,
            viewport_width: 1366,
            viewport_height: 768,
            locale: "en-US".to_string(),
            chrome_executable: None,
            close_timeout_ms: 10_000,
        }
    }
}

impl RenderConfig {
    pub fn immediate() -> Self {
        Self {
            settle_ms: 0,
            scroll_settle_ms: 0,
            ..Self::default()
        }
    }
}

/// How to start one isolated engine instance.
#[derive(Debug, Clone)]
pub struct LaunchSpec<'a> {
    pub user_agent: &'a str,
    pub proxy: Option<&'a str>,
    pub viewport: (u32, u32),
    pub locale: &'a str,
    /// Fresh profile directory owned by this call; removed after close.
    pub profile_dir: &'a Path,
}

/// Cookie injected into the rendering context before navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
}

/// Everything applied to the page before navigating.
#[derive(Debug, Clone)]
pub struct PageSetup<'a> {
    pub init_script: &'a str,
    pub cookies: Vec<BrowserCookie>,
    pub blocked: &'a [ResourceKind],
    pub extra_headers: BTreeMap<String, String>,
}

/// A rendering engine able to start disposable sessions.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether an engine binary is usable; checked once at startup.
    fn probe(&self) -> bool;

    async fn launch(&self, spec: &LaunchSpec<'_>) -> Result<Box<dyn BrowserSession>>;
}

/// One launched engine with one page.
#[async_trait]
pub trait BrowserSession: Send {
    async fn prepare(&mut self, setup: &PageSetup<'_>) -> Result<()>;

    /// Navigate and resolve once DOM content has loaded.
    async fn goto(&mut self, url: &str) -> Result<()>;

    /// Resolve once `selector` matches an element.
    async fn wait_for_selector(&mut self, selector: &str) -> Result<()>;

    async fn evaluate(&mut self, script: &str) -> Result<()>;

    async fn content(&mut self) -> Result<String>;

    async fn current_url(&mut self) -> Result<String>;

    /// Release the page, the engine process and any helper tasks.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// What the renderer needs from one fetch.
#[derive(Debug, Clone, Copy)]
pub struct RenderJob<'a> {
    pub url: &'a Url,
    pub identity: &'a Identity,
    pub proxy: Option<&'a str>,
    pub timeout: Duration,
    pub wait_selector: Option<&'a str>,
}

#[derive(Clone)]
pub struct BrowserRenderer {
    engine: Arc<dyn BrowserEngine>,
    config: RenderConfig,
}

impl BrowserRenderer {
    pub fn new(engine: Arc<dyn BrowserEngine>, config: RenderConfig) -> Self {
        Self { engine, config }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn is_available(&self) -> bool {
        self.engine.probe()
    }

    /// Render one page in a fresh engine bounded by `job.timeout` overall.
    ///
    /// The engine is closed exactly once on every exit path after a
    /// successful launch, and its profile directory is removed before
    /// returning. Closing is bounded by `close_timeout_ms` on top of
    /// `job.timeout`.
    pub async fn render(&self, job: &RenderJob<'_>) -> Result<FetchResponse> {
        let mut target = job.url.clone();
        target.set_fragment(None);

        let profile = tempfile::Builder::new()
            .prefix("tierfetch-profile-")
            .tempdir()
            .map_err(|e| FetchError::Render(format!("profile directory: {e}")))?;

        let deadline = tokio::time::Instant::now() + job.timeout;
        let spec = LaunchSpec {
            user_agent: &job.identity.user_agent,
            proxy: job.proxy,
            viewport: (self.config.viewport_width, self.config.viewport_height),
            locale: &self.config.locale,
            profile_dir: profile.path(),
        };

        let mut session = match tokio::time::timeout_at(deadline, self.engine.launch(&spec)).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(FetchError::RenderTimeout(job.timeout)),
        };

        let driven = tokio::time::timeout_at(
            deadline,
            AssertUnwindSafe(self.drive(session.as_mut(), &target, job)).catch_unwind(),
        )
        .await;

        let close_timeout = Duration::from_millis(self.config.close_timeout_ms);
        match tokio::time::timeout(close_timeout, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(engine = self.engine.name(), error = %e, "failed to close browser"),
            Err(_) => warn!(engine = self.engine.name(), "browser close timed out, session dropped"),
        }
        if let Err(e) = profile.close() {
            debug!(error = %e, "failed to remove browser profile");
        }

        match driven {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(FetchError::Render("render task panicked".to_string())),
            Err(_) => Err(FetchError::RenderTimeout(job.timeout)),
        }
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        target: &Url,
        job: &RenderJob<'_>,
    ) -> Result<FetchResponse> {
        let setup = PageSetup {
            init_script: STEALTH_SCRIPT,
            cookies: cookies_for(job.identity, target),
            blocked: &BLOCKED_RESOURCES,
            extra_headers: extra_headers_for(job.identity, &self.config.locale),
        };
        session.prepare(&setup).await?;

        let loaded = Duration::from_millis(self.config.content_loaded_timeout_ms);
        match tokio::time::timeout(loaded, session.goto(target.as_str())).await {
            Ok(result) => result?,
            Err(_) => warn!(url = %target, "content-loaded wait timed out, reading partial page"),
        }

        if let Some(selector) = job.wait_selector {
            let wait = Duration::from_millis(self.config.selector_timeout_ms);
            match tokio::time::timeout(wait, session.wait_for_selector(selector)).await {
                Ok(Ok(())) => debug!(selector, "selector appeared"),
                Ok(Err(e)) => warn!(selector, error = %e, "selector wait failed"),
                Err(_) => warn!(selector, "selector wait timed out"),
            }
        }

        tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;
        if let Err(e) = session.evaluate(SCROLL_SCRIPT).await {
            debug!(error = %e, "scroll failed");
        }
        tokio::time::sleep(Duration::from_millis(self.config.scroll_settle_ms)).await;

        let body = session.content().await?;
        let final_url = session
            .current_url()
            .await
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| target.to_string());

        let mut headers = BTreeMap::new();
        headers.insert(
            "content-type".to_string(),
            "text/html; charset=utf-8".to_string(),
        );

        Ok(FetchResponse {
            status: 200,
            headers,
            body,
            final_url,
            source: "browser".to_string(),
        })
    }
}

/// Caller cookies scoped to the target host.
pub(crate) fn cookies_for(identity: &Identity, target: &Url) -> Vec<BrowserCookie> {
    let host = target.host_str().unwrap_or_default();
    identity
        .cookies
        .iter()
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| BrowserCookie {
            name: name.to_string(),
            value: value.to_string(),
            domain: host.to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: false,
        })
        .collect()
}

/// Referer plus a matching `Accept-Language`, only when a referer was given.
pub(crate) fn extra_headers_for(identity: &Identity, locale: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    if !identity.referer.is_empty() {
        headers.insert("Referer".to_string(), identity.referer.clone());
        let primary = locale.split('-').next().unwrap_or(locale);
        headers.insert(
            "Accept-Language".to_string(),
            format!("{locale},{primary};q=0.9"),
        );
    }
    headers
}

/// Placeholder engine for builds without a rendering engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEngine;

#[async_trait]
impl BrowserEngine for NoEngine {
    fn name(&self) -> &'static str {
        "none"
    }

    fn probe(&self) -> bool {
        false
    }

    async fn launch(&self, _spec: &LaunchSpec<'_>) -> Result<Box<dyn BrowserSession>> {
        Err(FetchError::BrowserUnavailable)
    }
}

/// The engine compiled into this build.
pub fn default_engine(config: &RenderConfig) -> Arc<dyn BrowserEngine> {
    #[cfg(feature = "browser")]
    {
        Arc::new(ChromiumEngine::new(config))
    }
    #[cfg(not(feature = "browser"))]
    {
        let _ = config;
        Arc::new(NoEngine)
    }
}
