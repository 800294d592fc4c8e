//! Common types shared across tools.

use serde::{Deserialize, Serialize};

/// JSON envelope printed by the CLI: `{"ok": …, "data": …, "error": …}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }

    /// Failure that still carries diagnostic data.
    pub fn err_with(data: T, msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: Some(data),
            error: Some(msg.into()),
        }
    }
}
