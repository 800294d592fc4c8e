use super::*;
use crate::tools::fetch::identity::{Identity, USER_AGENTS};
use crate::tools::fetch::types::CookieJar;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Render,
    LaunchFails,
    GotoFails,
    Hang,
    SlowLoad,
    Panic,
    CloseHangs,
}

#[derive(Default)]
struct Calls {
    launches: AtomicUsize,
    closes: AtomicUsize,
    visited: Mutex<Vec<String>>,
    setups: Mutex<Vec<(Vec<BrowserCookie>, BTreeMap<String, String>)>>,
    scripts: Mutex<Vec<String>>,
    /// Profile directory of every launch and whether it existed then.
    profiles: Mutex<Vec<(PathBuf, bool)>>,
}

struct MockEngine {
    behavior: Behavior,
    calls: Arc<Calls>,
}

struct MockSession {
    behavior: Behavior,
    calls: Arc<Calls>,
    url: String,
}

#[async_trait]
impl BrowserEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn probe(&self) -> bool {
        true
    }

    async fn launch(&self, spec: &LaunchSpec<'_>) -> Result<Box<dyn BrowserSession>> {
        self.calls
            .profiles
            .lock()
            .unwrap()
            .push((spec.profile_dir.to_path_buf(), spec.profile_dir.is_dir()));
        if self.behavior == Behavior::LaunchFails {
            return Err(FetchError::Render("no display".into()));
        }
        self.calls.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            behavior: self.behavior,
            calls: self.calls.clone(),
            url: String::new(),
        }))
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn prepare(&mut self, setup: &PageSetup<'_>) -> Result<()> {
        assert_eq!(setup.init_script, STEALTH_SCRIPT);
        assert_eq!(setup.blocked, &BLOCKED_RESOURCES);
        self.calls
            .setups
            .lock()
            .unwrap()
            .push((setup.cookies.clone(), setup.extra_headers.clone()));
        Ok(())
    }

    async fn goto(&mut self, url: &str) -> Result<()> {
        self.calls.visited.lock().unwrap().push(url.to_string());
        self.url = url.to_string();
        match self.behavior {
            Behavior::GotoFails => Err(FetchError::Render("net::ERR_NAME_NOT_RESOLVED".into())),
            Behavior::Hang => std::future::pending().await,
            Behavior::SlowLoad => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
            Behavior::Panic => panic!("engine crashed"),
            _ => Ok(()),
        }
    }

    async fn wait_for_selector(&mut self, _selector: &str) -> Result<()> {
        std::future::pending().await
    }

    async fn evaluate(&mut self, script: &str) -> Result<()> {
        self.calls.scripts.lock().unwrap().push(script.to_string());
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        Ok("<html><body><h1>Rendered</h1></body></html>".to_string())
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        if self.behavior == Behavior::CloseHangs {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

fn renderer(behavior: Behavior) -> (BrowserRenderer, Arc<Calls>) {
    let calls = Arc::new(Calls::default());
    let engine = MockEngine {
        behavior,
        calls: calls.clone(),
    };
    let config = RenderConfig {
        content_loaded_timeout_ms: 1_000,
        selector_timeout_ms: 50,
        ..RenderConfig::immediate()
    };
    (BrowserRenderer::new(Arc::new(engine), config), calls)
}

fn identity(url: &Url, referer: &str) -> Identity {
    let jar = CookieJar::new().with("sid", "abc");
    Identity::new(USER_AGENTS[0], referer, &jar, url)
}

fn profiles(calls: &Calls) -> Vec<(PathBuf, bool)> {
    calls.profiles.lock().unwrap().clone()
}

async fn render_with(
    renderer: &BrowserRenderer,
    url: &str,
    referer: &str,
    timeout: Duration,
    wait_selector: Option<&str>,
) -> Result<FetchResponse> {
    let url = Url::parse(url).unwrap();
    let identity = identity(&url, referer);
    renderer
        .render(&RenderJob {
            url: &url,
            identity: &identity,
            proxy: None,
            timeout,
            wait_selector,
        })
        .await
}

#[tokio::test]
async fn renders_and_closes_once() {
    let (renderer, calls) = renderer(Behavior::Render);
    let resp = render_with(
        &renderer,
        "https://shop.example.com/item#reviews",
        "",
        Duration::from_secs(5),
        None,
    )
    .await
    .unwrap();

    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type(), Some("text/html; charset=utf-8"));
    assert_eq!(resp.source, "browser");
    assert!(resp.body.contains("Rendered"));
    assert_eq!(resp.final_url, "https://shop.example.com/item");
    assert_eq!(calls.launches.load(Ordering::SeqCst), 1);
    assert_eq!(calls.closes.load(Ordering::SeqCst), 1);
    assert_eq!(
        calls.visited.lock().unwrap().as_slice(),
        ["https://shop.example.com/item".to_string()]
    );
    assert_eq!(
        calls.scripts.lock().unwrap().as_slice(),
        [SCROLL_SCRIPT.to_string()]
    );
}

#[tokio::test]
async fn cookies_scoped_to_host_and_referer_headers() {
    let (renderer, calls) = renderer(Behavior::Render);
    render_with(
        &renderer,
        "https://shop.example.com/item",
        "https://www.google.com/",
        Duration::from_secs(5),
        None,
    )
    .await
    .unwrap();

    let setups = calls.setups.lock().unwrap();
    let (cookies, headers) = &setups[0];
    assert_eq!(
        cookies,
        &vec![BrowserCookie {
            name: "sid".into(),
            value: "abc".into(),
            domain: "shop.example.com".into(),
            path: "/".into(),
            secure: true,
            http_only: false,
        }]
    );
    assert_eq!(headers.get("Referer").map(String::as_str), Some("https://www.google.com/"));
    assert_eq!(
        headers.get("Accept-Language").map(String::as_str),
        Some("en-US,en;q=0.9")
    );
}

#[tokio::test]
async fn no_referer_means_no_extra_headers() {
    let (renderer, calls) = renderer(Behavior::Render);
    render_with(&renderer, "https://example.com/", "", Duration::from_secs(5), None)
        .await
        .unwrap();
    assert!(calls.setups.lock().unwrap()[0].1.is_empty());
}

#[tokio::test]
async fn navigation_error_still_closes() {
    let (renderer, calls) = renderer(Behavior::GotoFails);
    let err = render_with(&renderer, "https://example.com/", "", Duration::from_secs(5), None)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Render(_)));
    assert_eq!(calls.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn overall_timeout_still_closes() {
    let (renderer, calls) = renderer(Behavior::Hang);
    let renderer = BrowserRenderer::new(
        renderer.engine.clone(),
        RenderConfig {
            content_loaded_timeout_ms: 60_000,
            ..RenderConfig::immediate()
        },
    );
    let err = render_with(
        &renderer,
        "https://example.com/",
        "",
        Duration::from_millis(50),
        None,
    )
    .await
    .unwrap_err();
    assert_eq!(err, FetchError::RenderTimeout(Duration::from_millis(50)));
    assert_eq!(calls.launches.load(Ordering::SeqCst), 1);
    assert_eq!(calls.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn panic_is_contained_and_closes() {
    let (renderer, calls) = renderer(Behavior::Panic);
    let err = render_with(&renderer, "https://example.com/", "", Duration::from_secs(5), None)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Render(_)));
    assert_eq!(calls.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_load_degrades_to_partial_page() {
    let (renderer, calls) = renderer(Behavior::SlowLoad);
    let resp = render_with(&renderer, "https://example.com/", "", Duration::from_secs(90), None)
        .await
        .unwrap();
    assert!(resp.body.contains("Rendered"));
    assert_eq!(calls.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn selector_timeout_is_not_fatal() {
    let (renderer, calls) = renderer(Behavior::Render);
    let resp = render_with(
        &renderer,
        "https://example.com/",
        "",
        Duration::from_secs(5),
        Some("#never"),
    )
    .await
    .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(calls.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn launch_failure_has_nothing_to_close() {
    let (renderer, calls) = renderer(Behavior::LaunchFails);
    let err = render_with(&renderer, "https://example.com/", "", Duration::from_secs(5), None)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Render(_)));
    assert_eq!(calls.launches.load(Ordering::SeqCst), 0);
    assert_eq!(calls.closes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn repeated_calls_never_share_a_session() {
    let (renderer, calls) = renderer(Behavior::Render);
    for _ in 0..3 {
        render_with(&renderer, "https://example.com/", "", Duration::from_secs(5), None)
            .await
            .unwrap();
    }
    assert_eq!(calls.launches.load(Ordering::SeqCst), 3);
    assert_eq!(calls.closes.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn no_engine_is_unavailable() {
    let renderer = BrowserRenderer::new(Arc::new(NoEngine), RenderConfig::immediate());
    assert!(!renderer.is_available());
    let err = render_with(&renderer, "https://example.com/", "", Duration::from_secs(5), None)
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::BrowserUnavailable);
}

#[tokio::test]
async fn every_launch_gets_its_own_profile_dir() {
    let (renderer, calls) = renderer(Behavior::Render);
    for _ in 0..2 {
        render_with(&renderer, "https://example.com/", "", Duration::from_secs(5), None)
            .await
            .unwrap();
    }

    let seen = profiles(&calls);
    assert_eq!(seen.len(), 2);
    assert_ne!(seen[0].0, seen[1].0);
    for (dir, existed) in &seen {
        assert!(existed, "{} missing at launch", dir.display());
        assert!(!dir.exists(), "{} left behind", dir.display());
    }
}

#[tokio::test]
async fn profile_dir_removed_after_launch_failure() {
    let (renderer, calls) = renderer(Behavior::LaunchFails);
    render_with(&renderer, "https://example.com/", "", Duration::from_secs(5), None)
        .await
        .unwrap_err();
    let seen = profiles(&calls);
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].0.exists());
}

#[tokio::test(start_paused = true)]
async fn hanging_close_is_bounded() {
    let (renderer, calls) = renderer(Behavior::CloseHangs);
    let renderer = BrowserRenderer::new(
        renderer.engine.clone(),
        RenderConfig {
            close_timeout_ms: 2_000,
            ..RenderConfig::immediate()
        },
    );

    let started = tokio::time::Instant::now();
    let resp = render_with(&renderer, "https://example.com/", "", Duration::from_secs(30), None)
        .await
        .unwrap();
    assert!(resp.body.contains("Rendered"));
    assert!(started.elapsed() <= Duration::from_secs(3));
    assert_eq!(calls.closes.load(Ordering::SeqCst), 1);
    assert!(!profiles(&calls)[0].0.exists());
}

#[test]
fn cookies_with_empty_values_are_still_injected() {
    let url = Url::parse("https://example.com/").unwrap();
    let jar = CookieJar::new().with("consent", "").with("", "orphan");
    let identity = Identity::new(USER_AGENTS[0], "", &jar, &url);
    let cookies = cookies_for(&identity, &url);
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].name, "consent");
    assert_eq!(cookies[0].value, "");
    assert_eq!(cookies[0].domain, "example.com");
}
