//! Persistent activity log: one line per top-level fetch in
//! `~/.tierfetch/activity.log`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::tools::fetch::FetchOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Error,
}

impl LogLevel {
    fn glyph(&self) -> &'static str {
        match self {
            LogLevel::Info => "🟢",
            LogLevel::Error => "🔴",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub host: Option<String>,
    pub event: String,
    pub details: Option<String>,
}

impl LogEntry {
    fn line(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.level.glyph(),
            self.event,
            self.host.as_deref().unwrap_or("*"),
            self.details.as_deref().unwrap_or("")
        )
    }
}

#[derive(Debug, Clone)]
pub struct ActivityLogger {
    log_path: PathBuf,
}

impl ActivityLogger {
    /// Logger writing under the user's home directory.
    pub fn new() -> io::Result<Self> {
        let user_dirs = directories::UserDirs::new().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "could not determine home directory")
        })?;
        Self::in_dir(&user_dirs.home_dir().join(".tierfetch"))
    }

    /// Logger writing `activity.log` inside `dir` (created if missing).
    pub fn in_dir(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            log_path: dir.join("activity.log"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    pub fn log(
        &self,
        level: LogLevel,
        host: Option<&str>,
        event: &str,
        details: Option<&str>,
    ) -> io::Result<()> {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            host: host.map(str::to_string),
            event: event.to_string(),
            details: details.map(str::to_string),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(file, "{}", entry.line())
    }

    pub fn info(&self, host: Option<&str>, event: &str, details: Option<&str>) -> io::Result<()> {
        self.log(LogLevel::Info, host, event, details)
    }

    pub fn error(&self, host: Option<&str>, event: &str, details: Option<&str>) -> io::Result<()> {
        self.log(LogLevel::Error, host, event, details)
    }

    /// Record how one fetch ended.
    pub fn record(&self, host: Option<&str>, outcome: &FetchOutcome) -> io::Result<()> {
        let details = format!("attempts={} {}", outcome.attempts(), outcome.describe());
        if outcome.is_success() {
            self.info(host, "fetch", Some(&details))
        } else {
            self.error(host, "fetch", Some(&details))
        }
    }

    /// Matching lines, newest first.
    pub fn read_logs(&self, host_filter: Option<&str>, errors_only: bool) -> io::Result<Vec<String>> {
        if !self.log_path.exists() {
            return Ok(vec![]);
        }

        let reader = BufReader::new(fs::File::open(&self.log_path)?);
        let mut matching = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if errors_only && !line.contains(LogLevel::Error.glyph()) {
                continue;
            }
            if let Some(host) = host_filter {
                if !line.contains(host) {
                    continue;
                }
            }
            matching.push(line);
        }

        matching.reverse();
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn temp_logger() -> (TempDir, ActivityLogger) {
        let dir = TempDir::new().unwrap();
        let logger = ActivityLogger::in_dir(dir.path()).unwrap();
        (dir, logger)
    }

    #[test]
    fn missing_file_reads_empty() {
        let (_dir, logger) = temp_logger();
        assert!(logger.read_logs(None, false).unwrap().is_empty());
    }

    #[test]
    fn newest_first_with_filters() {
        let (_dir, logger) = temp_logger();
        logger.info(Some("a.example"), "fetch", Some("ok")).unwrap();
        logger.error(Some("b.example"), "fetch", Some("blocked")).unwrap();
        logger.info(None, "probe", None).unwrap();

        let all = logger.read_logs(None, false).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].contains("probe *"));

        let errors = logger.read_logs(None, true).unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("b.example"));

        let host = logger.read_logs(Some("a.example"), false).unwrap();
        assert_eq!(host.len(), 1);
        assert!(host[0].contains("🟢 fetch a.example ok"));
    }
}
