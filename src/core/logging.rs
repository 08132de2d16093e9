//! Purpose: Verbosity control and event emitters for the request/response cycle.
//! Exports: `LogLevel`, `LogSettings`, `LogLevelGuard`, `MAX_LOGGED_BODY_BYTES`.
//! Role: Explicit shared configuration injected into each `Transport` at construction.
//! Invariants: Emitters never read or consume a body; callers pass what was already captured.
//! Invariants: Credentials are masked in header dumps.
use super::headers::Headers;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

pub const MAX_LOGGED_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub enum LogLevel {
    #[default]
    None,
    Single,
    Headers,
    Body,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::None => "none",
            LogLevel::Single => "single",
            LogLevel::Headers => "headers",
            LogLevel::Body => "body",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            LogLevel::None => 0,
            LogLevel::Single => 1,
            LogLevel::Headers => 2,
            LogLevel::Body => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::None,
            1 => LogLevel::Single,
            2 => LogLevel::Headers,
            _ => LogLevel::Body,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseLogLevelError(String);

impl fmt::Display for ParseLogLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid log level `{}` (expected none|single|headers|body)",
            self.0
        )
    }
}

impl std::error::Error for ParseLogLevelError {}

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(LogLevel::None),
            "single" => Ok(LogLevel::Single),
            "headers" => Ok(LogLevel::Headers),
            "body" => Ok(LogLevel::Body),
            _ => Err(ParseLogLevelError(value.to_string())),
        }
    }
}

/// Shared, cloneable log-level handle. Every clone observes the same level.
#[derive(Clone, Debug, Default)]
pub struct LogSettings {
    level: Arc<AtomicU8>,
}

impl LogSettings {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level: Arc::new(AtomicU8::new(level.to_u8())),
        }
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Apply `level` and return the level it replaced.
    pub fn set(&self, level: LogLevel) -> LogLevel {
        LogLevel::from_u8(self.level.swap(level.to_u8(), Ordering::Relaxed))
    }

    /// Apply `level` until the returned guard is dropped.
    pub fn scoped(&self, level: LogLevel) -> LogLevelGuard {
        let previous = self.set(level);
        LogLevelGuard {
            settings: self.clone(),
            previous,
        }
    }
}

#[must_use = "the previous level is restored when the guard is dropped"]
pub struct LogLevelGuard {
    settings: LogSettings,
    previous: LogLevel,
}

impl LogLevelGuard {
    pub fn previous(&self) -> LogLevel {
        self.previous
    }
}

impl Drop for LogLevelGuard {
    fn drop(&mut self) {
        self.settings.set(self.previous);
    }
}

/// Body text as it should appear in a log line.
pub(crate) fn body_text(bytes: &[u8], truncated: bool) -> String {
    let cut = bytes.len().min(MAX_LOGGED_BODY_BYTES);
    let mut text = String::from_utf8_lossy(&bytes[..cut]).into_owned();
    if truncated || bytes.len() > cut {
        text.push_str(" …[truncated]");
    }
    text
}

pub(crate) fn request_started(level: LogLevel, method: &str, url: &str, headers: &Headers) {
    match level {
        LogLevel::None | LogLevel::Single => {}
        LogLevel::Headers | LogLevel::Body => tracing::info!(
            target: "bagsdk::transport",
            method,
            url,
            headers = %headers.redacted_dump(),
            "request"
        ),
    }
}

pub(crate) fn request_body(level: LogLevel, method: &str, url: &str, body: &str) {
    if level >= LogLevel::Body {
        tracing::info!(target: "bagsdk::transport", method, url, body, "request body");
    }
}

pub(crate) struct ResponseLog<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub status: u16,
    pub elapsed: Duration,
    pub headers: &'a Headers,
    pub body: Option<&'a str>,
}

pub(crate) fn response_finished(level: LogLevel, entry: &ResponseLog<'_>) {
    let elapsed_ms = entry.elapsed.as_millis() as u64;
    let ResponseLog {
        method,
        url,
        status,
        ..
    } = *entry;
    match level {
        LogLevel::None => {}
        LogLevel::Single => tracing::info!(
            target: "bagsdk::transport",
            method,
            url,
            status,
            elapsed_ms,
            "{method} {url} {status} {elapsed_ms}ms"
        ),
        LogLevel::Headers => tracing::info!(
            target: "bagsdk::transport",
            method,
            url,
            status,
            elapsed_ms,
            headers = %entry.headers.redacted_dump(),
            "{method} {url} {status} {elapsed_ms}ms"
        ),
        LogLevel::Body => tracing::info!(
            target: "bagsdk::transport",
            method,
            url,
            status,
            elapsed_ms,
            headers = %entry.headers.redacted_dump(),
            body = entry.body.unwrap_or(""),
            "{method} {url} {status} {elapsed_ms}ms"
        ),
    }
}

pub(crate) fn request_failed(method: &str, url: &str, elapsed: Duration, err: &dyn fmt::Display) {
    let elapsed_ms = elapsed.as_millis() as u64;
    tracing::error!(
        target: "bagsdk::transport",
        method,
        url,
        elapsed_ms,
        error = %err,
        "request failed"
    );
}
