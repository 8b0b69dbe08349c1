use clipvault_core::{ConfigError, ErrorMetadata, LogLevel};
use clipvault_storage::StorageError;
use thiserror::Error;

/// Video provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(StorageError),

    /// Managed-streaming API answered with a non-success status
    #[error("Streaming API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Streaming API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<StorageError> for ProviderError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Config(e) => ProviderError::Config(e),
            other => ProviderError::Storage(other),
        }
    }
}

impl ErrorMetadata for ProviderError {
    fn error_code(&self) -> &'static str {
        match self {
            ProviderError::Config(e) => e.error_code(),
            ProviderError::Storage(e) => e.error_code(),
            ProviderError::Api { .. } | ProviderError::Http(_) => "STREAM_API_ERROR",
            ProviderError::InvalidInput(_) => "INVALID_INPUT",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            ProviderError::Config(_) | ProviderError::InvalidInput(_) => false,
            ProviderError::Storage(e) => e.is_recoverable(),
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Http(_) => true,
        }
    }

    fn client_message(&self) -> String {
        match self {
            ProviderError::Config(e) => e.client_message(),
            ProviderError::Storage(e) => e.client_message(),
            ProviderError::Api { .. } | ProviderError::Http(_) => {
                "The streaming service is temporarily unavailable, please retry".to_string()
            }
            ProviderError::InvalidInput(msg) => msg.clone(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            ProviderError::Config(e) => e.log_level(),
            ProviderError::Storage(e) => e.log_level(),
            ProviderError::Api { .. } | ProviderError::Http(_) => LogLevel::Warn,
            ProviderError::InvalidInput(_) => LogLevel::Debug,
        }
    }
}
