use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::log::ActivityLogger;
use crate::tools::extract::{self, PageSummary};
use crate::tools::fetch::{FetchOutcome, FetchRequest, Orchestrator, TierConfig};
use crate::tools::types::ApiResponse;

#[derive(Parser)]
#[command(
    name = "tierfetch",
    version,
    about = "Fetch pages through anti-bot defenses with tiered escalation (JSON only)"
)]
pub struct Cli {
    /// Debug-level diagnostics on stderr (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch one URL and report the outcome
    Fetch(FetchArgs),
    /// Show which backends and whether the browser tier are available
    Capabilities(ConfigArgs),
    /// Show the activity log, newest first
    Logs(LogsArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// JSON tier configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct FetchArgs {
    /// Target URL; common typos (missing slash/colon, stray www) are repaired
    url: String,
    #[arg(long)]
    user_agent: Option<String>,
    #[arg(long)]
    referer: Option<String>,
    /// Raw cookie string as copied from DevTools: "k=v; a=b"
    #[arg(long)]
    cookies: Option<String>,
    #[arg(long)]
    proxy: Option<String>,
    /// Seconds to wait before the first request
    #[arg(long, default_value_t = 1.0)]
    delay: f64,
    /// Per-attempt timeout in seconds
    #[arg(long, default_value_t = 20)]
    timeout: u64,
    /// Visit the site root first to collect session cookies
    #[arg(long)]
    prime_cookies: bool,
    /// Allow the enhanced backends tier
    #[arg(long)]
    aggressive: bool,
    /// Render in a headless browser even when plain HTTP succeeds
    #[arg(long)]
    use_browser: bool,
    /// CSS selector whose matches are reported (and awaited by the browser)
    #[arg(long)]
    selector: Option<String>,
    /// Include the page summary (title, meta, headings, links, images)
    #[arg(long)]
    summary: bool,
    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Args)]
struct LogsArgs {
    /// Only lines mentioning this host
    #[arg(long)]
    host: Option<String>,
    /// Only failed fetches
    #[arg(long)]
    errors: bool,
}

/// What `tierfetch fetch` prints inside the envelope.
#[derive(Debug, Serialize)]
pub struct FetchReport {
    pub url: String,
    pub outcome: &'static str,
    pub tier: Option<String>,
    pub status: Option<u16>,
    pub final_url: Option<String>,
    pub content_type: Option<String>,
    pub attempts: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<PageSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector_matches: Option<Vec<String>>,
}

impl FetchReport {
    fn new(url: &str, outcome: &FetchOutcome) -> Self {
        let (label, tier, hints) = match outcome {
            FetchOutcome::Success { tier, .. } => ("success", Some(tier.to_string()), vec![]),
            FetchOutcome::Blocked { last_tier, hints, .. } => {
                ("blocked", Some(last_tier.to_string()), hints.clone())
            }
            FetchOutcome::Failed { last_tier, hints, .. } => {
                ("failed", last_tier.map(|t| t.to_string()), hints.clone())
            }
        };
        let response = outcome.response();
        Self {
            url: url.to_string(),
            outcome: label,
            tier,
            status: outcome.status(),
            final_url: response.map(|r| r.final_url.clone()),
            content_type: response.and_then(|r| r.content_type().map(str::to_string)),
            attempts: outcome.attempts(),
            hints,
            summary: None,
            selector_matches: None,
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "tierfetch=debug" } else { "tierfetch=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.cmd {
        Command::Fetch(args) => fetch_cmd(args),
        Command::Capabilities(args) => load_config(&args).map(|config| {
            print_json(ApiResponse::ok(Orchestrator::probe(config).capabilities()));
            true
        }),
        Command::Logs(args) => logs_cmd(args),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            print_json(ApiResponse::<()>::err(format!("{e:#}")));
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &ConfigArgs) -> anyhow::Result<TierConfig> {
    match &args.config {
        Some(path) => TierConfig::load(path).with_context(|| "loading tier config"),
        None => Ok(TierConfig::default()),
    }
}

fn build_request(args: &FetchArgs) -> FetchRequest {
    let mut request = FetchRequest::new(args.url.clone())
        .delay(Duration::from_secs_f64(args.delay.max(0.0)))
        .timeout(Duration::from_secs(args.timeout))
        .prime_cookies(args.prime_cookies)
        .aggressive(args.aggressive)
        .use_browser(args.use_browser);
    if let Some(ua) = &args.user_agent {
        request = request.user_agent(ua.as_str());
    }
    if let Some(referer) = &args.referer {
        request = request.referer(referer.as_str());
    }
    if let Some(raw) = &args.cookies {
        request = request.cookies_raw(raw);
    }
    if let Some(proxy) = &args.proxy {
        request = request.proxy(proxy.as_str());
    }
    if let Some(selector) = &args.selector {
        request = request.wait_selector(selector.as_str());
    }
    request
}

fn fetch_cmd(args: FetchArgs) -> anyhow::Result<bool> {
    let config = load_config(&args.config)?;
    let mut orchestrator = Orchestrator::probe(config);
    if let Ok(logger) = ActivityLogger::new() {
        orchestrator = orchestrator.with_activity_log(logger);
    }

    let request = build_request(&args);
    let outcome = crate::runtime::block_on(orchestrator.fetch(&request));
    let mut report = FetchReport::new(&args.url, &outcome);

    let FetchOutcome::Success { response, .. } = &outcome else {
        print_json(ApiResponse::err_with(report, outcome.describe()));
        return Ok(false);
    };

    if args.summary {
        report.summary = Some(extract::summarize_response(response));
    }
    if let Some(css) = &args.selector {
        report.selector_matches = Some(extract::select(&response.body, css)?);
    }
    print_json(ApiResponse::ok(report));
    Ok(true)
}

fn logs_cmd(args: LogsArgs) -> anyhow::Result<bool> {
    let logger = ActivityLogger::new().context("opening activity log")?;
    let lines = logger
        .read_logs(args.host.as_deref(), args.errors)
        .with_context(|| format!("reading {}", logger.path().display()))?;
    print_json(ApiResponse::ok(lines));
    Ok(true)
}

fn print_json<T: Serialize>(val: T) {
    match serde_json::to_string_pretty(&val) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to serialize output: {e}"),
    }
}
