//! Operator-facing connection diagnostics.
//!
//! A single "list at most one object" probe, classified into actionable outcomes.
//! Messages name environment variables, never their values.

use clipvault_core::{ConfigError, StorageSettings};
use serde_json::json;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

use crate::factory::create_object_store;
use crate::traits::StorageError;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionHealth {
    Healthy { bucket: String },
    MissingConfiguration(&'static str),
    InvalidConfiguration(&'static str),
    CredentialsRejected,
    SignatureMismatch,
    BucketNotFound,
    AccessDenied,
    Timeout,
    Unreachable(String),
}

impl ConnectionHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ConnectionHealth::Healthy { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            ConnectionHealth::Healthy { .. } => "healthy",
            ConnectionHealth::MissingConfiguration(_)
            | ConnectionHealth::InvalidConfiguration(_) => "misconfigured",
            ConnectionHealth::CredentialsRejected
            | ConnectionHealth::SignatureMismatch
            | ConnectionHealth::AccessDenied => "unauthorized",
            ConnectionHealth::BucketNotFound => "bucket_not_found",
            ConnectionHealth::Timeout => "timeout",
            ConnectionHealth::Unreachable(_) => "unreachable",
        }
    }

    /// What the operator should do next.
    pub fn message(&self) -> String {
        match self {
            ConnectionHealth::Healthy { bucket } => {
                format!("Connected to bucket '{}'", bucket)
            }
            ConnectionHealth::MissingConfiguration(name) => {
                format!("{} is not set; add it to the environment or .env file", name)
            }
            ConnectionHealth::InvalidConfiguration(name) => {
                format!("{} has an invalid value; check its format", name)
            }
            ConnectionHealth::CredentialsRejected => {
                "The store does not recognize S3_ACCESS_KEY_ID; check that the key exists and is active"
                    .to_string()
            }
            ConnectionHealth::SignatureMismatch => {
                "Request signature rejected; check S3_SECRET_ACCESS_KEY and that S3_REGION matches the endpoint"
                    .to_string()
            }
            ConnectionHealth::BucketNotFound => {
                "S3_BUCKET does not exist at S3_ENDPOINT; check the bucket name and endpoint".to_string()
            }
            ConnectionHealth::AccessDenied => {
                "Credentials are valid but lack list permission on S3_BUCKET".to_string()
            }
            ConnectionHealth::Timeout => format!(
                "No response from S3_ENDPOINT within {}s; check network access",
                PROBE_TIMEOUT.as_secs()
            ),
            ConnectionHealth::Unreachable(detail) => {
                format!("Store request failed: {}", detail)
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "status": self.status(),
            "message": self.message(),
        })
    }
}

impl Display for ConnectionHealth {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}: {}", self.status(), self.message())
    }
}

/// Map a probe failure to a health outcome.
pub fn classify(error: &StorageError) -> ConnectionHealth {
    match error {
        StorageError::Config(ConfigError::Missing(name)) => {
            ConnectionHealth::MissingConfiguration(*name)
        }
        StorageError::Config(ConfigError::Invalid { name, .. }) => {
            ConnectionHealth::InvalidConfiguration(*name)
        }
        StorageError::Transfer { status, code, .. } => match (code.as_deref(), status) {
            (Some("InvalidAccessKeyId"), _) => ConnectionHealth::CredentialsRejected,
            (Some("SignatureDoesNotMatch"), _) => ConnectionHealth::SignatureMismatch,
            (Some("NoSuchBucket"), _) | (_, Some(404)) => ConnectionHealth::BucketNotFound,
            (Some("AccessDenied"), _) | (_, Some(403)) => ConnectionHealth::AccessDenied,
            (Some(code), _) => ConnectionHealth::Unreachable(code.to_string()),
            (None, Some(status)) => ConnectionHealth::Unreachable(format!("HTTP {}", status)),
            (None, None) => ConnectionHealth::Unreachable("no response from store".to_string()),
        },
        other => ConnectionHealth::Unreachable(other.to_string()),
    }
}

/// Build the store from settings and probe it.
pub async fn check_connection(settings: &StorageSettings) -> ConnectionHealth {
    let store = match create_object_store(settings) {
        Ok(store) => store,
        Err(e) => return classify(&e),
    };

    let health = match tokio::time::timeout(PROBE_TIMEOUT, store.probe()).await {
        Ok(Ok(())) => ConnectionHealth::Healthy {
            bucket: store.bucket().to_string(),
        },
        Ok(Err(e)) => classify(&e),
        Err(_) => ConnectionHealth::Timeout,
    };

    if health.is_healthy() {
        tracing::info!(bucket = %store.bucket(), "Store connection healthy");
    } else {
        tracing::warn!(status = health.status(), "Store connection check failed");
    }

    health
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(status: Option<u16>, code: Option<&str>) -> StorageError {
        StorageError::Transfer {
            operation: "probe",
            status,
            code: code.map(String::from),
            message: "wJalrXUtnFEMI should never be echoed".to_string(),
        }
    }

    #[test]
    fn test_distinguishes_configuration_credentials_and_signature() {
        assert_eq!(
            classify(&StorageError::Config(ConfigError::Missing("S3_BUCKET"))),
            ConnectionHealth::MissingConfiguration("S3_BUCKET")
        );
        assert_eq!(
            classify(&transfer(Some(403), Some("InvalidAccessKeyId"))),
            ConnectionHealth::CredentialsRejected
        );
        assert_eq!(
            classify(&transfer(Some(403), Some("SignatureDoesNotMatch"))),
            ConnectionHealth::SignatureMismatch
        );
        assert_eq!(
            classify(&transfer(Some(403), None)),
            ConnectionHealth::AccessDenied
        );
        assert_eq!(
            classify(&transfer(Some(404), Some("NoSuchBucket"))),
            ConnectionHealth::BucketNotFound
        );
    }

    #[test]
    fn test_messages_never_echo_provider_text() {
        for health in [
            classify(&transfer(Some(403), Some("InvalidAccessKeyId"))),
            classify(&transfer(Some(403), Some("SignatureDoesNotMatch"))),
            classify(&transfer(Some(500), Some("InternalError"))),
            classify(&transfer(None, None)),
        ] {
            assert!(!health.message().contains("wJalrXUtnFEMI"), "{}", health);
            assert!(!health.is_healthy());
        }
    }

    #[test]
    fn test_missing_configuration_message_is_actionable() {
        let health = ConnectionHealth::MissingConfiguration("S3_SECRET_ACCESS_KEY");
        assert_eq!(health.status(), "misconfigured");
        assert!(health.message().starts_with("S3_SECRET_ACCESS_KEY is not set"));
        assert_eq!(health.to_json()["status"], "misconfigured");
    }

    #[cfg(feature = "storage-s3")]
    #[tokio::test]
    async fn test_check_connection_reports_missing_bucket() {
        let settings = clipvault_core::Config::from_lookup(|_| None)
            .unwrap()
            .storage;
        let health = check_connection(&settings).await;
        assert_eq!(health, ConnectionHealth::MissingConfiguration("S3_BUCKET"));
    }
}
