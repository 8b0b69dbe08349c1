#[cfg(feature = "storage-s3")]
use crate::S3ObjectStore;
use crate::{ObjectStore, StorageResult, StoreClient, StoreLayout};
use clipvault_core::StorageSettings;
use std::sync::Arc;

/// Create the object-store backend from settings.
///
/// Fails with a named configuration error when a required value is missing.
pub fn create_object_store(settings: &StorageSettings) -> StorageResult<Arc<dyn ObjectStore>> {
    #[cfg(feature = "storage-s3")]
    {
        let store = S3ObjectStore::new(settings)?;
        tracing::debug!(bucket = %store.bucket(), endpoint = ?settings.endpoint, "Created S3 object store");
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "storage-s3"))]
    {
        let _ = settings;
        Err(crate::StorageError::transfer(
            "connect",
            "S3 storage backend not available (storage-s3 feature not enabled)",
        ))
    }
}

/// Create the facade: validated key layout over the configured backend.
pub fn create_store_client(settings: &StorageSettings) -> StorageResult<StoreClient> {
    let layout = StoreLayout::from_settings(settings)?;
    let store = create_object_store(settings)?;
    Ok(StoreClient::new(store, layout))
}

#[cfg(all(test, feature = "storage-s3"))]
mod tests {
    use super::*;
    use crate::StorageError;
    use clipvault_core::{Config, ConfigError};
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> StorageSettings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
            .unwrap()
            .storage
    }

    #[test]
    fn test_create_store_client_reports_first_missing_value() {
        let err = create_store_client(&settings(&[("S3_REGION", "us-west-004")]))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            StorageError::Config(ConfigError::Missing("S3_BUCKET"))
        ));
    }

    #[test]
    fn test_create_store_client_rejects_overlapping_inbox() {
        let err = create_store_client(&settings(&[
            ("S3_BUCKET", "clips"),
            ("UPLOAD_PREFIX", "hls/uploads"),
        ]))
        .err()
        .unwrap();
        assert!(matches!(
            err,
            StorageError::Config(ConfigError::Invalid {
                name: "UPLOAD_PREFIX",
                ..
            })
        ));
    }

    #[test]
    fn test_create_store_client_with_full_settings() {
        let client = create_store_client(&settings(&[
            ("S3_ENDPOINT", "https://s3.us-west-004.backblazeb2.com"),
            ("S3_REGION", "us-west-004"),
            ("S3_ACCESS_KEY_ID", "AKIDEXAMPLE"),
            ("S3_SECRET_ACCESS_KEY", "secret"),
            ("S3_BUCKET", "clips"),
        ]))
        .unwrap();
        assert_eq!(client.bucket(), "clips");
        assert_eq!(client.layout().upload_prefix, "videos/inbox");
    }
}
