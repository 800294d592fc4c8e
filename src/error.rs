use crate::tools::fetch::BackendKind;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid proxy: {0}")]
    InvalidProxy(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend unavailable: {0}")]
    BackendUnavailable(BackendKind),
    #[error("browser rendering is not available")]
    BrowserUnavailable,
    #[error("browser render timed out after {}s", .0.as_secs())]
    RenderTimeout(Duration),
    #[error("browser render failed: {0}")]
    Render(String),
    #[error("failed to build client: {0}")]
    Client(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("invalid selector: {0}")]
    InvalidSelector(String),
}

impl FetchError {
    /// True for failures that happened on the wire (DNS, connect, timeout).
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }
}

/* Conversions so `?` works smoothly */
impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Transport(format!("timed out: {e}"))
        } else if e.is_builder() {
            FetchError::Client(e.to_string())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_timeout_reports_seconds() {
        let err = FetchError::RenderTimeout(Duration::from_secs(90));
        assert_eq!(err.to_string(), "browser render timed out after 90s");
    }

    #[test]
    fn only_transport_is_transport() {
        assert!(FetchError::Transport("dns".into()).is_transport());
        assert!(!FetchError::BrowserUnavailable.is_transport());
        assert!(!FetchError::InvalidUrl("x".into()).is_transport());
    }
}
