use serde::Serialize;
use std::fmt;

const SHORT_BODY_LEN: usize = 400;

const BLOCKED_STATUSES: [u16; 3] = [401, 403, 429];

const BLOCK_MARKERS: [&str; 27] = [
    "access denied",
    "request blocked",
    "forbidden",
    "unusual traffic",
    "cloudflare",
    "attention required",
    "robot check",
    "captcha",
    "akamai",
    "perimeterx",
    "datadome",
    "sucuri",
    "verification required",
    "are you a human",
    "verify you are a human",
    "temporary block",
    "blocked by",
    "ddos protection",
    "cf-browser-verification",
    "cf-chl-",
    "px-captcha",
    "please enable javascript and cookies",
    "checking your browser",
    "suspicious activity",
    "bot detection",
    "incapsula",
    "pardon our interruption",
];

/// What tripped the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockSignal {
    Status { status: u16 },
    Marker { marker: &'static str },
    ShortBody { len: usize, status: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockVerdict {
    pub blocked: bool,
    pub signal: Option<BlockSignal>,
}

impl BlockVerdict {
    pub const CLEAN: Self = Self {
        blocked: false,
        signal: None,
    };

    fn blocked(signal: BlockSignal) -> Self {
        Self {
            blocked: true,
            signal: Some(signal),
        }
    }

    pub fn is_clean(&self) -> bool {
        !self.blocked
    }

    /// Blocked by a non-status signal (marker or size heuristic).
    pub fn is_soft(&self) -> bool {
        matches!(
            self.signal,
            Some(BlockSignal::Marker { .. }) | Some(BlockSignal::ShortBody { .. })
        )
    }
}

impl fmt::Display for BlockVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.signal {
            None => f.write_str("clean"),
            Some(BlockSignal::Status { status }) => write!(f, "blocked status {status}"),
            Some(BlockSignal::Marker { marker }) => write!(f, "block marker \"{marker}\""),
            Some(BlockSignal::ShortBody { len, status }) => {
                write!(f, "{len}-char body on status {status}")
            }
        }
    }
}

pub fn is_blocking_status(status: u16) -> bool {
    BLOCKED_STATUSES.contains(&status)
}

/// Judge one response. First matching rule wins:
/// 1. status 401/403/429
/// 2. a known anti-bot marker in the body (case-insensitive)
/// 3. a trimmed body under 400 chars on a 4xx/5xx status
///
/// A short body on a success status is not suspicious by itself.
pub fn classify(status: u16, body: &str) -> BlockVerdict {
    if is_blocking_status(status) {
        return BlockVerdict::blocked(BlockSignal::Status { status });
    }

    let lower = body.to_lowercase();
    if let Some(marker) = BLOCK_MARKERS.iter().copied().find(|m| lower.contains(m)) {
        return BlockVerdict::blocked(BlockSignal::Marker { marker });
    }

    let len = lower.trim().chars().count();
    if len < SHORT_BODY_LEN && (400..600).contains(&status) {
        return BlockVerdict::blocked(BlockSignal::ShortBody { len, status });
    }

    BlockVerdict::CLEAN
}
