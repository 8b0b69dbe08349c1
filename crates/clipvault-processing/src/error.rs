use clipvault_core::{ErrorMetadata, LogLevel};
use clipvault_storage::StorageError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// External transcoder failures.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transcoder {stage} failed with exit code {}: {stderr_tail}", exit_code_label(.exit_code))]
    Failed {
        stage: &'static str,
        exit_code: Option<i32>,
        /// Last characters of the process's stderr
        stderr_tail: String,
    },

    #[error("Transcoder {stage} timed out after {}s", .after.as_secs())]
    TimedOut { stage: &'static str, after: Duration },

    #[error("Transcoder {stage} cancelled")]
    Cancelled { stage: &'static str },

    #[error("Transcoder IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_code_label(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => code.to_string(),
        None => "none (killed by signal)".to_string(),
    }
}

impl TranscodeError {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            TranscodeError::Failed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

/// Packaging pipeline failures. Local resources are released before any of these
/// reach the caller; already-published objects are left in place.
#[derive(Debug, Error)]
pub enum PackagingError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error("Workspace IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transcoder produced no {}", .0.display())]
    MissingOutput(PathBuf),
}

impl ErrorMetadata for PackagingError {
    fn error_code(&self) -> &'static str {
        match self {
            PackagingError::Storage(e) => e.error_code(),
            PackagingError::Transcode(TranscodeError::TimedOut { .. }) => "TRANSCODE_TIMEOUT",
            PackagingError::Transcode(TranscodeError::Cancelled { .. }) => "TRANSCODE_CANCELLED",
            PackagingError::Transcode(_) | PackagingError::MissingOutput(_) => "TRANSCODE_ERROR",
            PackagingError::Io(_) => "IO_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            PackagingError::Storage(e) => e.is_recoverable(),
            PackagingError::Transcode(TranscodeError::TimedOut { .. })
            | PackagingError::Transcode(TranscodeError::Cancelled { .. }) => true,
            _ => false,
        }
    }

    fn client_message(&self) -> String {
        match self {
            PackagingError::Storage(e) => e.client_message(),
            _ => "The video could not be processed".to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            PackagingError::Storage(e) => e.log_level(),
            PackagingError::Transcode(TranscodeError::Cancelled { .. }) => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_display_carries_exit_code_and_tail() {
        let err = TranscodeError::Failed {
            stage: "hls",
            exit_code: Some(1),
            stderr_tail: "Invalid data found when processing input".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Transcoder hls failed with exit code 1: Invalid data found when processing input"
        );
        assert_eq!(err.exit_code(), Some(1));
    }

    #[test]
    fn test_packaging_error_metadata() {
        let err = PackagingError::from(TranscodeError::TimedOut {
            stage: "poster",
            after: Duration::from_secs(30),
        });
        assert_eq!(err.error_code(), "TRANSCODE_TIMEOUT");
        assert!(err.is_recoverable());
        assert_eq!(err.to_string(), "Transcoder poster timed out after 30s");

        let err = PackagingError::from(StorageError::NotFound("videos/a.mp4".into()));
        assert_eq!(err.error_code(), "NOT_FOUND");
    }
}
