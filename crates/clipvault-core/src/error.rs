//! Error types module
//!
//! Configuration errors live here because every crate demands settings lazily and
//! must report the same named failure. The `ErrorMetadata` trait lets each crate's
//! error type describe how the (external) HTTP boundary should present it.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like an expired upload window
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "CONFIGURATION_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether the caller can retry (e.g. by requesting a fresh upload URL)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Missing or malformed settings.
///
/// Only the variable name is ever rendered, never its value when the value is a secret.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0} is not set")]
    Missing(&'static str),

    #[error("Configuration error: invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

impl ErrorMetadata for ConfigError {
    fn error_code(&self) -> &'static str {
        "CONFIGURATION_ERROR"
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn client_message(&self) -> String {
        "The video service is not configured".to_string()
    }

    fn log_level(&self) -> LogLevel {
        LogLevel::Error
    }
}
