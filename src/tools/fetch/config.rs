use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::browser::RenderConfig;
use super::retry::RetryPolicy;
use crate::error::{FetchError, Result};

/// Tunables for the escalation pipeline. Every field has a default, so a
/// config file only needs the keys it changes.
///
/// # Examples
/// ```
/// use tierfetch::tools::fetch::TierConfig;
///
/// let cfg: TierConfig = serde_json::from_str(r#"{"rotation_pause_ms": 0}"#).unwrap();
/// assert_eq!(cfg.rotation_pause_ms, 0);
/// assert_eq!(cfg.rotation_user_agents, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    /// Distinct user-agents tried while rotating.
    pub rotation_user_agents: usize,
    /// Politeness pause before every rotation attempt.
    pub rotation_pause_ms: u64,
    /// Extra random pause on top of `rotation_pause_ms`.
    pub rotation_jitter_ms: u64,
    /// Pause after the cookie-priming request.
    pub priming_pause_ms: u64,
    /// Whole-call budget for the browser tier.
    pub browser_timeout_secs: u64,
    pub retry: RetryPolicy,
    pub render: RenderConfig,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            rotation_user_agents: 5,
            rotation_pause_ms: 400,
            rotation_jitter_ms: 0,
            priming_pause_ms: 300,
            browser_timeout_secs: 90,
            retry: RetryPolicy::default(),
            render: RenderConfig::default(),
        }
    }
}

impl TierConfig {
    /// No pauses and no transport retries; handy for tests and local mirrors.
    pub fn immediate() -> Self {
        Self {
            rotation_pause_ms: 0,
            rotation_jitter_ms: 0,
            priming_pause_ms: 0,
            retry: RetryPolicy::none(),
            render: RenderConfig::immediate(),
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| FetchError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| FetchError::Config(format!("{}: {e}", path.display())))
    }

    pub fn rotation_pause(&self) -> Duration {
        Duration::from_millis(self.rotation_pause_ms)
    }

    pub fn priming_pause(&self) -> Duration {
        Duration::from_millis(self.priming_pause_ms)
    }

    pub fn browser_timeout(&self) -> Duration {
        Duration::from_secs(self.browser_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: TierConfig =
            serde_json::from_str(r#"{"retry": {"max_retries": 1}, "browser_timeout_secs": 30}"#)
                .unwrap();
        assert_eq!(cfg.retry.max_retries, 1);
        assert_eq!(cfg.retry.backoff_ms, 600);
        assert_eq!(cfg.browser_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.rotation_pause(), Duration::from_millis(400));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = TierConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, FetchError::Config(_)));
    }
}
