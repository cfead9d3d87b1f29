//! Library error types.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Error returned by every fallible operation in the crate.
#[derive(Debug)]
pub struct AppError {
    payload: BTreeMap<String, String>,
    kind: ErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Shell command ran and failed
    Command,
    /// Shell command did not finish within its own timeout
    CommandTimeout,
    /// No matching emulator process, or its pid could not be parsed
    NotFound,
    /// Emulator could not be launched, or exited before becoming ready
    Launch,
    /// Restart deadline exceeded
    Timeout,
    /// Emulator process disappeared while waiting for boot
    ProcessLost,
    /// Configuration error
    Config,
    /// File system error
    Io,
}

impl ErrorKind {
    pub fn code(&self) -> u32 {
        match self {
            Self::Command => 1001,
            Self::CommandTimeout => 1002,
            Self::NotFound => 1003,
            Self::Launch => 2001,
            Self::Timeout => 2002,
            Self::ProcessLost => 2003,
            Self::Config => 3001,
            Self::Io => 3002,
        }
    }
}

impl AppError {
    pub fn new(kind: ErrorKind, payload: BTreeMap<String, String>) -> Self {
        Self { payload, kind }
    }

    /// Create an error with a single "detail" key from a non-empty string,
    /// or an empty payload if the string is empty.
    fn with_detail(kind: ErrorKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let payload = if detail.is_empty() {
            BTreeMap::new()
        } else {
            BTreeMap::from([("detail".to_string(), detail)])
        };
        Self::new(kind, payload)
    }

    pub fn command(command: &str, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Command,
            BTreeMap::from([
                ("command".to_string(), command.to_string()),
                ("detail".to_string(), detail.into()),
            ]),
        )
    }

    pub fn command_timeout(command: &str, timeout: Duration) -> Self {
        Self::new(
            ErrorKind::CommandTimeout,
            BTreeMap::from([
                ("command".to_string(), command.to_string()),
                ("timeout_ms".to_string(), timeout.as_millis().to_string()),
            ]),
        )
    }

    pub fn not_found(pattern: &str, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::NotFound,
            BTreeMap::from([
                ("pattern".to_string(), pattern.to_string()),
                ("detail".to_string(), detail.into()),
            ]),
        )
    }

    pub fn launch(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Launch, message)
    }

    pub fn restart_timeout(budget: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            BTreeMap::from([("timeout_ms".to_string(), budget.as_millis().to_string())]),
        )
    }

    /// The process could not be re-resolved after a racing event.
    pub fn process_lost(name: &str, cause: &Self) -> Self {
        Self::new(
            ErrorKind::ProcessLost,
            BTreeMap::from([
                ("name".to_string(), name.to_string()),
                ("detail".to_string(), cause.to_string()),
            ]),
        )
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Config, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::with_detail(ErrorKind::Io, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Whether a command gave up because its own timeout elapsed.
    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::CommandTimeout
    }

    pub fn payload(&self, key: &str) -> Option<&str> {
        self.payload.get(key).map(String::as_str)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.payload.is_empty() {
            write!(f, "{:?}", self.kind)
        } else {
            let pairs: Vec<String> = self
                .payload
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, "{:?}: {}", self.kind, pairs.join(", "))
        }
    }
}

impl std::error::Error for AppError {}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct as _;
        let mut s = serializer.serialize_struct("AppError", 2)?;
        s.serialize_field("code", &self.kind.code())?;
        s.serialize_field("payload", &self.payload)?;
        s.end()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<toml::ser::Error> for AppError {
    fn from(err: toml::ser::Error) -> Self {
        Self::config(err.to_string())
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Explicit best-effort handling for results whose failure is acceptable.
pub trait ResultExt<T> {
    /// Log the error at warn level and continue without the value.
    fn ignore_and_log(self, context: &str) -> Option<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn ignore_and_log(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("{context}: {e} (ignored)");
                None
            }
        }
    }
}
