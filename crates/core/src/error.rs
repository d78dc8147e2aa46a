//! Severity-tagged errors delivered on the watcher error channel

use serde::{Deserialize, Serialize};
use std::backtrace::Backtrace;
use std::fmt;
use std::str::FromStr;

/// Severity of a reported error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    Unspecified,
    Trace,
    Debug,
    Info,
    Warning,
    /// Recoverable per-item failure; the watch continues
    Error,
    /// The root is unusable and its watch has ended
    Critical,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Unspecified => "UNSPECIFIED",
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = std::convert::Infallible;

    /// Case-insensitive; unknown text parses as [`Level::Unspecified`]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "TRACE" => Level::Trace,
            "DEBUG" => Level::Debug,
            "INFO" => Level::Info,
            "WARN" | "WARNING" => Level::Warning,
            "ERROR" => Level::Error,
            "CRITICAL" => Level::Critical,
            _ => Level::Unspecified,
        })
    }
}

/// An error report with its captured diagnostic context
#[derive(Debug, Clone, thiserror::Error)]
#[error("[{level}] {message}")]
pub struct WatchError {
    pub level: Level,
    pub message: String,
    /// Backtrace captured where the error was reported (empty unless
    /// `RUST_BACKTRACE` enables capture)
    pub context: String,
}

impl WatchError {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        let backtrace = Backtrace::capture();
        Self {
            level,
            message: message.into(),
            context: backtrace.to_string(),
        }
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(Level::Critical, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Level::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Level::Info, message)
    }

    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(Level::Debug, message)
    }

    /// Build a report from an error value, keeping its source chain in the message
    pub fn from_error(level: Level, err: &(dyn std::error::Error + 'static)) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::new(level, message)
    }
}
