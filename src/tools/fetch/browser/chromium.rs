use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::fetch::{
    EnableParams, EventRequestPaused, FailRequestParams, RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, ErrorReason, Headers, ResourceType, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{BrowserEngine, BrowserSession, LaunchSpec, PageSetup, RenderConfig, ResourceKind};
use crate::error::{FetchError, Result};

const CHROME_ENV: &str = "TIERFETCH_CHROME";
const CHROME_BINARIES: [&str; 4] = [
    "google-chrome",
    "chromium",
    "chromium-browser",
    "google-chrome-stable",
];
const SELECTOR_POLL: Duration = Duration::from_millis(200);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Locate a Chromium binary: explicit path, then `TIERFETCH_CHROME`, then `PATH`.
pub fn find_chromium(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit.filter(|p| p.exists()) {
        return Some(path.clone());
    }
    if let Ok(p) = std::env::var(CHROME_ENV) {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }
    CHROME_BINARIES
        .iter()
        .find_map(|bin| which::which(bin).ok())
}

fn render_err(e: impl std::fmt::Display) -> FetchError {
    FetchError::Render(e.to_string())
}

fn resource_type(kind: ResourceKind) -> ResourceType {
    match kind {
        ResourceKind::Image => ResourceType::Image,
        ResourceKind::Media => ResourceType::Media,
        ResourceKind::Font => ResourceType::Font,
        ResourceKind::Stylesheet => ResourceType::Stylesheet,
    }
}

/// Headless Chromium over the DevTools protocol.
#[derive(Debug, Clone)]
pub struct ChromiumEngine {
    executable: Option<PathBuf>,
}

impl ChromiumEngine {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            executable: find_chromium(config.chrome_executable.as_ref()),
        }
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    fn name(&self) -> &'static str {
        "chromium"
    }

    fn probe(&self) -> bool {
        self.executable.is_some()
    }

    async fn launch(&self, spec: &LaunchSpec<'_>) -> Result<Box<dyn BrowserSession>> {
        let executable = self
            .executable
            .clone()
            .ok_or(FetchError::BrowserUnavailable)?;
        let (width, height) = spec.viewport;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .user_data_dir(spec.profile_dir)
            .window_size(width, height)
            .viewport(Some(Viewport {
                width,
                height,
                ..Default::default()
            }))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg(format!("--lang={}", spec.locale))
            .arg(format!("--user-agent={}", spec.user_agent));
        if let Some(proxy) = spec.proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }
        let config = builder.build().map_err(render_err)?;

        let (mut browser, mut handler) = Browser::launch(config).await.map_err(render_err)?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(render_err(e));
            }
        };

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            interceptor: None,
        }))
    }
}

struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    interceptor: Option<JoinHandle<()>>,
}

impl ChromiumSession {
    /// Fail every paused request of a blocked resource type.
    async fn block_resources(&mut self, blocked: &[ResourceKind]) -> Result<()> {
        if blocked.is_empty() {
            return Ok(());
        }
        let patterns: Vec<RequestPattern> = blocked
            .iter()
            .map(|kind| {
                RequestPattern::builder()
                    .url_pattern("*")
                    .resource_type(resource_type(*kind))
                    .request_stage(RequestStage::Request)
                    .build()
            })
            .collect();

        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(render_err)?;
        self.page
            .execute(EnableParams::builder().patterns(patterns).build())
            .await
            .map_err(render_err)?;

        let page = self.page.clone();
        self.interceptor = Some(tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let fail = FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient);
                if let Err(e) = page.execute(fail).await {
                    debug!(error = %e, "failed to drop blocked request");
                }
            }
        }));
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn prepare(&mut self, setup: &PageSetup<'_>) -> Result<()> {
        self.page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(setup.init_script))
            .await
            .map_err(render_err)?;

        if !setup.cookies.is_empty() {
            let mut params = Vec::with_capacity(setup.cookies.len());
            for c in &setup.cookies {
                let param = CookieParam::builder()
                    .name(c.name.clone())
                    .value(c.value.clone())
                    .domain(c.domain.clone())
                    .path(c.path.clone())
                    .secure(c.secure)
                    .http_only(c.http_only)
                    .build()
                    .map_err(render_err)?;
                params.push(param);
            }
            self.page.set_cookies(params).await.map_err(render_err)?;
        }

        if !setup.extra_headers.is_empty() {
            let headers = Headers::new(serde_json::json!(setup.extra_headers));
            self.page
                .execute(SetExtraHttpHeadersParams::new(headers))
                .await
                .map_err(render_err)?;
        }

        self.block_resources(setup.blocked).await
    }

    async fn goto(&mut self, url: &str) -> Result<()> {
        self.page.goto(url).await.map_err(render_err)?;
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str) -> Result<()> {
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(SELECTOR_POLL).await;
        }
    }

    async fn evaluate(&mut self, script: &str) -> Result<()> {
        self.page.evaluate(script).await.map_err(render_err)?;
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        self.page.content().await.map_err(render_err)
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(render_err)?
            .map(|u| u.to_string())
            .unwrap_or_default())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        if let Some(task) = this.interceptor.take() {
            task.abort();
        }
        let closed = match tokio::time::timeout(SHUTDOWN_GRACE, this.browser.close()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(render_err(e)),
            Err(_) => Err(FetchError::Render("browser close timed out".to_string())),
        };
        if closed.is_err() {
            if let Some(Err(e)) = this.browser.kill().await {
                debug!(error = %e, "failed to kill browser process");
            }
        }
        if tokio::time::timeout(SHUTDOWN_GRACE, this.browser.wait()).await.is_err() {
            debug!("browser process still running after shutdown");
        }
        this.handler_task.abort();
        closed
    }
}
