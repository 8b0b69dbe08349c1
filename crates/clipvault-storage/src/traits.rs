//! Storage abstraction trait
//!
//! This module defines the backend seam that the facade drives. Backends expose
//! single pages and raw calls; pagination, key layout and URL building live in
//! `StoreClient`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use clipvault_core::{ConfigError, ErrorMetadata, LogLevel, SourceObject};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Store {operation} failed{}: {message}", status_suffix(.status, .code))]
    Transfer {
        operation: &'static str,
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },

    #[error("Presign failed: {0}")]
    Presign(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Size mismatch for {key}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        key: String,
        expected: u64,
        actual: u64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn status_suffix(status: &Option<u16>, code: &Option<String>) -> String {
    match (status, code) {
        (Some(status), Some(code)) => format!(" ({} {})", status, code),
        (Some(status), None) => format!(" ({})", status),
        (None, Some(code)) => format!(" ({})", code),
        (None, None) => String::new(),
    }
}

impl StorageError {
    pub(crate) fn transfer(operation: &'static str, message: impl Into<String>) -> Self {
        StorageError::Transfer {
            operation,
            status: None,
            code: None,
            message: message.into(),
        }
    }

    /// Provider error code, when the store reported one (e.g. `SignatureDoesNotMatch`).
    pub fn provider_code(&self) -> Option<&str> {
        match self {
            StorageError::Transfer { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl ErrorMetadata for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            StorageError::Config(_) => "CONFIGURATION_ERROR",
            StorageError::NotFound(_) => "NOT_FOUND",
            StorageError::Transfer { .. } | StorageError::Presign(_) => "STORE_TRANSFER_ERROR",
            StorageError::InvalidKey(_) => "INVALID_KEY",
            StorageError::SizeMismatch { .. } => "INTEGRITY_ERROR",
            StorageError::Io(_) => "IO_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StorageError::Transfer { .. }
                | StorageError::Presign(_)
                | StorageError::SizeMismatch { .. }
        )
    }

    fn client_message(&self) -> String {
        match self {
            StorageError::Config(e) => e.client_message(),
            StorageError::NotFound(_) => "The requested video does not exist".to_string(),
            StorageError::InvalidKey(msg) => msg.clone(),
            StorageError::Transfer { .. } | StorageError::Presign(_) => {
                "Storage is temporarily unavailable, please retry".to_string()
            }
            StorageError::SizeMismatch { .. } | StorageError::Io(_) => {
                "The video could not be processed".to_string()
            }
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            StorageError::NotFound(_) | StorageError::InvalidKey(_) => LogLevel::Debug,
            StorageError::Transfer { .. } | StorageError::Presign(_) => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One page of a prefix listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<SourceObject>,
    /// Present while more pages remain
    pub next_token: Option<String>,
}

/// Object metadata returned by a HEAD request.
#[derive(Debug, Clone, Default)]
pub struct ObjectHead {
    pub size: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
}

/// Storage abstraction trait
///
/// All object-store backends (S3-compatible, in-memory for tests) implement this trait.
/// Implementations never retry; failures are surfaced with the provider's status/code.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket this backend is bound to
    fn bucket(&self) -> &str;

    /// Fetch one page of keys under `prefix`, resuming from `continuation_token`.
    async fn list_page(
        &self,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
    ) -> StorageResult<ListPage>;

    /// HEAD an object. Returns `StorageError::NotFound` when it does not exist.
    async fn head(&self, key: &str) -> StorageResult<ObjectHead>;

    /// Stream an object into a local file, returning the number of bytes written.
    async fn download_to_path(&self, key: &str, destination: &Path) -> StorageResult<u64>;

    /// Upload bytes to a key, overwriting any existing object.
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        cache_control: Option<&str>,
    ) -> StorageResult<()>;

    /// Generate a presigned PUT URL bound to `key` and `content_type`.
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// List at most one object; used only for operator diagnostics.
    async fn probe(&self) -> StorageResult<()>;
}
