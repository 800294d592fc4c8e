pub mod backend;
pub mod browser;
pub mod classify;
mod client;
pub mod config;
mod headers;
pub mod identity;
pub mod impersonate;
pub mod orchestrator;
pub mod retry;
pub mod types;

pub use backend::{Attempt, BackendConnector, BackendKind, BackendSet, Capabilities, FetchBackend, ReqwestConnector};
pub use browser::{BrowserEngine, BrowserRenderer, BrowserSession, RenderConfig};
pub use classify::{classify, BlockSignal, BlockVerdict};
pub use config::TierConfig;
pub use identity::{Identity, IdentityRotator, SiteHint};
pub use impersonate::ImpersonateConnector;
pub use orchestrator::Orchestrator;
pub use retry::RetryPolicy;
pub use types::*;

use once_cell::sync::Lazy;

use crate::log::ActivityLogger;

/// Process-wide orchestrator: capabilities are probed on first use and the
/// activity log goes to `~/.tierfetch/activity.log` when writable.
static DEFAULT: Lazy<Orchestrator> = Lazy::new(|| {
    let orchestrator = Orchestrator::probe(TierConfig::default());
    match ActivityLogger::new() {
        Ok(logger) => orchestrator.with_activity_log(logger),
        Err(e) => {
            tracing::debug!(error = %e, "activity log disabled");
            orchestrator
        }
    }
});

/// Fetch one page, escalating through the tiers until a clean response
/// turns up or every applicable tier is exhausted.
///
/// Never returns an error: invalid input, blocks and transport failures
/// all come back as a [`FetchOutcome`].
///
/// # Examples
/// ```no_run
/// use tierfetch::tools::fetch::{fetch, FetchRequest};
///
/// # async fn example() {
/// let request = FetchRequest::new("example.com").aggressive(true);
/// let outcome = fetch(&request).await;
/// if let Some(response) = outcome.response() {
///     println!("{} via {}", response.status, response.source);
/// }
/// # }
/// ```
pub async fn fetch(request: &FetchRequest) -> FetchOutcome {
    DEFAULT.fetch(request).await
}

/// Blocking wrapper around [`fetch`] on the shared runtime.
pub fn fetch_blocking(request: &FetchRequest) -> FetchOutcome {
    crate::runtime::block_on(fetch(request))
}

/// Which backends and whether the browser tier are available in this process.
pub fn capabilities() -> Capabilities {
    DEFAULT.capabilities()
}
