//! The escalation pipeline:
//! `Priming → Baseline → Rotating → EnhancedBackends → BrowserRender → Exhausted`.
//!
//! Tiers run strictly one after another inside one call; the first clean
//! response short-circuits everything after it. Every per-call resource
//! (HTTP sessions, cookie stores, identities, the browser) is created inside
//! [`Orchestrator::fetch`] and dropped before it returns.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::backend::{
    Attempt, BackendConnector, BackendKind, BackendSet, Capabilities, FetchBackend,
    ReqwestConnector,
};
use super::browser::{default_engine, BrowserEngine, BrowserRenderer, RenderJob};
use super::classify::{classify, BlockVerdict};
use super::config::TierConfig;
use super::identity::{Identity, IdentityRotator};
use super::impersonate::ImpersonateConnector;
use super::retry::jitter_ms;
use super::types::{FetchOutcome, FetchRequest, FetchResponse, Tier, TierOutcome};
use crate::error::FetchError;
use crate::log::ActivityLogger;
use crate::tools::clean::{normalize_url, parse_target};

const HINT_BROWSER: &str = "enable the browser tier (build with the `browser` feature and install Chromium)";
const HINT_IDENTITY: &str = "paste real cookies (DevTools) & a real Chrome UA";
const HINT_PROXY: &str = "use a residential proxy in the site's country";
const HINT_REFERER: &str = "set Referer to https://www.google.com/";

/// What one call has seen so far.
#[derive(Debug, Default)]
struct Run {
    attempts: usize,
    last_tier: Option<Tier>,
    last_blocked: Option<(FetchResponse, BlockVerdict, Tier)>,
    last_error: Option<FetchError>,
}

impl Run {
    fn record_blocked(&mut self, tier: Tier, response: FetchResponse, verdict: BlockVerdict) {
        debug!(
            tier = %tier,
            status = response.status,
            verdict = %verdict,
            soft = verdict.is_soft(),
            "blocked"
        );
        self.last_tier = Some(tier);
        self.last_blocked = Some((response, verdict, tier));
    }

    fn record_error(&mut self, tier: Tier, error: FetchError) {
        debug!(tier = %tier, error = %error, "tier failed");
        self.last_tier = Some(tier);
        self.last_error = Some(error);
    }

    /// Fold one backend result in; hands back the response when it is clean
    /// (and, with `require_ok`, also 2xx/3xx).
    fn observe(&mut self, tier: Tier, outcome: TierOutcome, require_ok: bool) -> Option<FetchResponse> {
        self.last_tier = Some(tier);
        match outcome {
            TierOutcome::Success(response) | TierOutcome::Blocked(response) => {
                let verdict = classify(response.status, &response.body);
                if verdict.is_clean() && (!require_ok || response.is_http_ok()) {
                    Some(response)
                } else {
                    self.record_blocked(tier, response, verdict);
                    None
                }
            }
            TierOutcome::BackendUnavailable => None,
            TierOutcome::TransportError(e) => {
                self.record_error(tier, e);
                None
            }
        }
    }

    fn success(self, response: FetchResponse, tier: Tier) -> FetchOutcome {
        FetchOutcome::Success {
            response,
            tier,
            attempts: self.attempts,
        }
    }

    fn exhausted(self, browser_available: bool) -> FetchOutcome {
        let mut hints = Vec::new();
        if !browser_available {
            hints.push(HINT_BROWSER.to_string());
        }
        hints.extend([HINT_IDENTITY, HINT_PROXY, HINT_REFERER].map(String::from));

        match (self.last_blocked, self.last_error) {
            (Some((last_response, verdict, last_tier)), _) => FetchOutcome::Blocked {
                last_response,
                verdict,
                last_tier,
                attempts: self.attempts,
                hints,
            },
            (None, cause) => FetchOutcome::Failed {
                cause: cause.unwrap_or_else(|| FetchError::Transport("no tier produced a response".into())),
                last_tier: self.last_tier,
                attempts: self.attempts,
                hints,
            },
        }
    }
}

/// Runs the tiered fetch. Cheap to share: holds only probe results and
/// configuration, never per-call state.
#[derive(Clone)]
pub struct Orchestrator {
    config: TierConfig,
    backends: BackendSet,
    renderer: Option<BrowserRenderer>,
    activity: Option<ActivityLogger>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("backends", &self.backends)
            .field("browser", &self.renderer.as_ref().map(|r| r.engine_name()))
            .finish()
    }
}

impl Orchestrator {
    /// Probe the given connectors and engine once; absent ones are skipped
    /// for the lifetime of this orchestrator.
    pub fn new(
        config: TierConfig,
        connectors: Vec<Arc<dyn BackendConnector>>,
        engine: Arc<dyn BrowserEngine>,
    ) -> Self {
        let backends = BackendSet::probe(connectors);
        let renderer = BrowserRenderer::new(engine, config.render.clone());
        let renderer = renderer.is_available().then_some(renderer);
        info!(
            backends = ?backends.kinds(),
            browser = renderer.is_some(),
            "capabilities probed"
        );
        Self {
            config,
            backends,
            renderer,
            activity: None,
        }
    }

    /// Everything this build can offer: reqwest baseline/HTTP2/platform-TLS,
    /// the impersonating client and Chromium when their features are on.
    pub fn probe(config: TierConfig) -> Self {
        let retry = config.retry.clone();
        let connectors: Vec<Arc<dyn BackendConnector>> = vec![
            Arc::new(ReqwestConnector::baseline(retry.clone())),
            Arc::new(ReqwestConnector::new(BackendKind::TlsFingerprint, retry.clone())),
            Arc::new(ReqwestConnector::new(BackendKind::Http2, retry)),
            Arc::new(ImpersonateConnector::new()),
        ];
        let engine = default_engine(&config.render);
        Self::new(config, connectors, engine)
    }

    pub fn with_activity_log(mut self, logger: ActivityLogger) -> Self {
        self.activity = Some(logger);
        self
    }

    pub fn config(&self) -> &TierConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            backends: self.backends.kinds(),
            browser: self.renderer.is_some(),
        }
    }

    /// One resilient fetch. Never errors: every failure is an outcome.
    pub async fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        let normalized = normalize_url(&request.url);
        let target = match parse_target(&normalized) {
            Ok(url) => url,
            Err(cause) => {
                warn!(url = %request.url, error = %cause, "rejected before any network call");
                return FetchOutcome::Failed {
                    cause,
                    last_tier: None,
                    attempts: 0,
                    hints: vec![],
                };
            }
        };

        let outcome = self.run(request, &target).await;

        match &outcome {
            FetchOutcome::Success { tier, attempts, response } => {
                info!(url = %target, tier = %tier, status = response.status, attempts, "fetched")
            }
            other => warn!(url = %target, attempts = other.attempts(), "{}", other.describe()),
        }
        if let Some(logger) = &self.activity {
            if let Err(e) = logger.record(target.host_str(), &outcome) {
                debug!(error = %e, "activity log write failed");
            }
        }
        outcome
    }

    async fn run(&self, request: &FetchRequest, target: &Url) -> FetchOutcome {
        let proxy = request.proxy.as_deref();
        let mut rotator = IdentityRotator::new(
            target,
            request.user_agent.as_deref(),
            request.referer.as_deref(),
            &request.cookies,
        );
        let mut run = Run::default();

        let baseline = match self.backends.get(BackendKind::Baseline) {
            Some(connector) => match connector.connect(proxy) {
                Ok(backend) => Some(backend),
                Err(cause @ FetchError::InvalidProxy(_)) => {
                    return FetchOutcome::Failed {
                        cause,
                        last_tier: None,
                        attempts: 0,
                        hints: vec![],
                    }
                }
                Err(e) => {
                    run.record_error(Tier::Baseline, e);
                    None
                }
            },
            None => {
                run.record_error(Tier::Baseline, FetchError::BackendUnavailable(BackendKind::Baseline));
                None
            }
        };

        if !request.delay.is_zero() {
            tokio::time::sleep(request.delay).await;
        }

        let mut clean: Option<(FetchResponse, Tier)> = None;

        if let Some(backend) = baseline.as_deref() {
            if request.prime_cookies {
                self.prime(backend, &mut rotator, target, request.timeout, &mut run).await;
            }

            let identity = rotator.pick();
            run.attempts += 1;
            let outcome = backend.fetch(&attempt(target, &identity, request.timeout)).await;
            if let Some(response) = run.observe(Tier::Baseline, outcome, false) {
                clean = Some((response, Tier::Baseline));
            }

            if clean.is_none() {
                clean = self
                    .rotate(backend, &mut rotator, target, request.timeout, &mut run)
                    .await
                    .map(|r| (r, Tier::Rotating));
            }
        }

        if clean.is_none() && request.aggressive {
            clean = self
                .enhanced(&mut rotator, target, request, &mut run)
                .await
                .map(|r| (r, Tier::EnhancedBackends));
        }

        if request.use_browser || clean.is_none() {
            match &self.renderer {
                Some(renderer) => {
                    let identity = rotator.for_browser();
                    run.attempts += 1;
                    let job = RenderJob {
                        url: target,
                        identity: &identity,
                        proxy,
                        timeout: self.config.browser_timeout(),
                        wait_selector: request.wait_selector.as_deref(),
                    };
                    match renderer.render(&job).await {
                        Ok(response) => return run.success(response, Tier::BrowserRender),
                        Err(e) => {
                            warn!(tier = %Tier::BrowserRender, error = %e, "browser render failed");
                            if clean.is_none() {
                                run.record_error(Tier::BrowserRender, e);
                            }
                        }
                    }
                }
                None => debug!(tier = %Tier::BrowserRender, "browser unavailable, skipped"),
            }
        }

        match clean {
            Some((response, tier)) => run.success(response, tier),
            None => run.exhausted(self.renderer.is_some()),
        }
    }

    /// Hit the site root once so the session collects cookies. Outcome ignored.
    async fn prime(
        &self,
        backend: &dyn FetchBackend,
        rotator: &mut IdentityRotator,
        target: &Url,
        timeout: Duration,
        run: &mut Run,
    ) {
        let mut root = target.clone();
        root.set_path("/");
        root.set_query(None);
        root.set_fragment(None);

        let identity = rotator.priming();
        run.attempts += 1;
        match backend.fetch(&attempt(&root, &identity, timeout)).await {
            TierOutcome::Success(r) | TierOutcome::Blocked(r) => {
                debug!(tier = %Tier::Priming, status = r.status, "primed")
            }
            TierOutcome::TransportError(e) => {
                debug!(tier = %Tier::Priming, error = %e, "priming failed, ignored")
            }
            TierOutcome::BackendUnavailable => {}
        }
        tokio::time::sleep(self.config.priming_pause()).await;
    }

    async fn rotate(
        &self,
        backend: &dyn FetchBackend,
        rotator: &mut IdentityRotator,
        target: &Url,
        timeout: Duration,
        run: &mut Run,
    ) -> Option<FetchResponse> {
        for identity in rotator.rotation(self.config.rotation_user_agents) {
            let pause = self.config.rotation_pause()
                + Duration::from_millis(jitter_ms(self.config.rotation_jitter_ms));
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            run.attempts += 1;
            debug!(
                tier = %Tier::Rotating,
                attempt = run.attempts,
                referer = %identity.referer,
                "rotating identity"
            );
            let outcome = backend.fetch(&attempt(target, &identity, timeout)).await;
            if let Some(response) = run.observe(Tier::Rotating, outcome, true) {
                return Some(response);
            }
        }
        None
    }

    /// Each available enhanced backend once, in priority order. The first
    /// 2xx/3xx response ends the tier; it still has to classify clean.
    async fn enhanced(
        &self,
        rotator: &mut IdentityRotator,
        target: &Url,
        request: &FetchRequest,
        run: &mut Run,
    ) -> Option<FetchResponse> {
        for connector in self.backends.enhanced() {
            let kind = connector.kind();
            let backend = match connector.connect(request.proxy.as_deref()) {
                Ok(backend) => backend,
                Err(e) => {
                    debug!(backend = %kind, error = %e, "enhanced backend skipped");
                    continue;
                }
            };

            let identity = rotator.pick();
            run.attempts += 1;
            debug!(tier = %Tier::EnhancedBackends, backend = %kind, "trying enhanced backend");
            match backend.fetch(&attempt(target, &identity, request.timeout)).await {
                TierOutcome::Success(response) | TierOutcome::Blocked(response)
                    if response.is_http_ok() =>
                {
                    return run.observe(Tier::EnhancedBackends, TierOutcome::Success(response), true);
                }
                TierOutcome::BackendUnavailable => {
                    debug!(backend = %kind, "enhanced backend unavailable");
                }
                other => {
                    run.observe(Tier::EnhancedBackends, other, true);
                }
            }
        }
        None
    }
}

fn attempt<'a>(url: &'a Url, identity: &'a Identity, timeout: Duration) -> Attempt<'a> {
    Attempt {
        url,
        identity,
        timeout,
    }
}
