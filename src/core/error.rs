//! Purpose: Define the single error taxonomy shared by the transport and its callers.
//! Exports: `Error`, `ErrorKind`, `ErrorEntry`, `to_exit_code`, fallback constants.
//! Role: Same type travels in a `Reply` error slot or as a propagated `Err`.
//! Invariants: `message` is always populated; fallback text is used when the server gives none.
//! Invariants: Overwriting the message never touches `entries`, `status`, `name`, or `source`.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt;

pub const FALLBACK_MESSAGE: &str = "an unknown error occurred";
pub const FALLBACK_NAME: &str = "UnknownError";
pub const PARSE_FAILURE_TITLE: &str = "failed to parse response";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The request never produced a response (DNS, connect, timeout, disconnect).
    Transport,
    /// The server answered with a non-2xx status.
    Status,
    /// The server answered 2xx but the body was not the expected JSON.
    Decode,
    /// A request value could not be serialized.
    Encode,
    Usage,
    Io,
}

/// One `{status, title, detail}` unit from a server error body.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
pub struct ErrorEntry {
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: u16,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

impl ErrorEntry {
    pub fn new(status: u16, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status,
            title: title.into(),
            detail: detail.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    List(Vec<ErrorEntry>),
    Envelope { errors: Vec<ErrorEntry> },
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    name: String,
    stack: Option<String>,
    status: Option<u16>,
    entries: Vec<ErrorEntry>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        let backtrace = Backtrace::capture();
        let stack = match backtrace.status() {
            BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };
        Self {
            kind,
            message: String::new(),
            name: String::new(),
            stack,
            status: None,
            entries: Vec::new(),
            source: None,
        }
    }

    /// Build the wrapping error for a non-2xx response body.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let entries = match serde_json::from_slice::<ErrorBody>(body) {
            Ok(ErrorBody::List(entries)) | Ok(ErrorBody::Envelope { errors: entries }) => entries,
            Err(_) => Vec::new(),
        };
        Self::new(ErrorKind::Status)
            .with_status(status)
            .with_entries(entries)
    }

    /// Build the wrapping error for a 2xx body that failed to decode.
    pub fn decode_failure(status: u16, err: serde_json::Error) -> Self {
        let entry = ErrorEntry::new(
            status,
            PARSE_FAILURE_TITLE,
            format!("invalid json in response body: {err}"),
        );
        Self::new(ErrorKind::Decode)
            .with_status(status)
            .with_entries(vec![entry])
            .with_source(err)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    /// Title of the first structured entry, if any.
    pub fn title(&self) -> Option<&str> {
        self.entries.first().map(|entry| entry.title.as_str())
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.set_message(message);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach structured entries and derive the message (and fallback name) from them.
    pub fn with_entries(mut self, entries: Vec<ErrorEntry>) -> Self {
        let sourced = entries.first().and_then(|entry| {
            if !entry.detail.is_empty() {
                Some(entry.detail.clone())
            } else if !entry.title.is_empty() {
                Some(entry.title.clone())
            } else {
                None
            }
        });
        match sourced {
            Some(message) => self.message = message,
            None => {
                self.message = FALLBACK_MESSAGE.to_string();
                self.name = FALLBACK_NAME.to_string();
            }
        }
        self.entries = entries;
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(status) = self.status {
            write!(f, " (status: {status})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Status => 1,
        ErrorKind::Usage => 2,
        ErrorKind::Transport => 3,
        ErrorKind::Decode => 4,
        ErrorKind::Encode => 5,
        ErrorKind::Io => 6,
    }
}

/// Any status shape a server sends; values that are not a `u16` become `0`.
fn lenient_status<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let status = match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            })
            .and_then(|n| u16::try_from(n).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    Ok(status.unwrap_or(0))
}
