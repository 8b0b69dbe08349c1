use std::sync::Arc;

use clipvault_core::{Config, ProviderKind};

use crate::managed_stream::ManagedStreamProvider;
use crate::object_storage::ObjectStorageProvider;
use crate::provider::VideoProvider;

/// Build the process-wide provider from configuration.
///
/// Construction performs no I/O and never fails; missing settings surface on the first
/// operation that needs them.
pub fn create_video_provider(config: &Config) -> Arc<dyn VideoProvider> {
    let provider: Arc<dyn VideoProvider> = match config.provider {
        ProviderKind::ObjectStorage => Arc::new(ObjectStorageProvider::new(config.storage.clone())),
        ProviderKind::ManagedStream => Arc::new(ManagedStreamProvider::new(
            config.stream.clone(),
            config.storage.allowed_content_types.clone(),
        )),
    };
    tracing::debug!(provider = %provider.kind(), "Selected video provider");
    provider
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned()).unwrap()
    }

    #[test]
    fn test_defaults_to_object_storage_without_credentials() {
        let provider = create_video_provider(&config_from(&[]));
        assert_eq!(provider.kind(), ProviderKind::ObjectStorage);
    }

    #[test]
    fn test_switch_selects_managed_stream() {
        let provider = create_video_provider(&config_from(&[
            ("VIDEO_PROVIDER", "cloudflare"),
            ("STREAM_DELIVERY_BASE", "https://customer-abc.cloudflarestream.com"),
        ]));
        assert_eq!(provider.kind(), ProviderKind::ManagedStream);
        assert_eq!(
            provider.get_hls_url("abc123").unwrap(),
            "https://customer-abc.cloudflarestream.com/abc123/manifest/video.m3u8"
        );
    }
}
