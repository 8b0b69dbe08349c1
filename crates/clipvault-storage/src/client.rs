//! Object-store client facade
//!
//! `StoreClient` drives an `ObjectStore` backend: it follows pagination, applies the
//! configured key layout, issues presigned upload URLs and builds public URLs. It holds
//! no business logic beyond that.

use bytes::Bytes;
use chrono::Utc;
use clipvault_core::{ConfigError, CreateUploadUrlResult, SourceObject, StorageSettings};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::keys;
use crate::traits::{ObjectHead, ObjectStore, StorageError, StorageResult};

/// Key layout and URL settings applied by the facade.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    pub public_base_url: Option<String>,
    pub source_prefix: String,
    pub upload_prefix: String,
    pub hls_prefix: String,
    pub poster_prefix: String,
    pub video_id_tag: String,
    pub upload_url_expiry: Duration,
}

impl StoreLayout {
    pub fn from_settings(settings: &StorageSettings) -> Result<Self, ConfigError> {
        settings.validate_layout()?;
        Ok(Self {
            public_base_url: settings
                .public_base_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
            source_prefix: settings.source_prefix.clone(),
            upload_prefix: settings.upload_prefix.clone(),
            hls_prefix: settings.hls_prefix.clone(),
            poster_prefix: settings.poster_prefix.clone(),
            video_id_tag: settings.video_id_tag.clone(),
            upload_url_expiry: Duration::from_secs(settings.upload_url_expiry_secs),
        })
    }

    fn reserved_prefixes(&self) -> [&str; 2] {
        [self.hls_prefix.as_str(), self.poster_prefix.as_str()]
    }

    pub fn video_id(&self, key: &str) -> String {
        keys::video_id_for_key(&self.video_id_tag, key)
    }

    pub fn manifest_key(&self, video_id: &str) -> String {
        keys::hls_manifest_key(&self.hls_prefix, video_id)
    }

    pub fn hls_object_key(&self, video_id: &str, relative: &str) -> String {
        keys::hls_object_key(&self.hls_prefix, video_id, relative)
    }

    pub fn poster_key(&self, video_id: &str) -> String {
        keys::poster_key(&self.poster_prefix, video_id)
    }

    /// Public URL for `key` under `PUBLIC_BASE_URL`. Always https.
    pub fn public_url(&self, key: &str) -> StorageResult<String> {
        let base = self
            .public_base_url
            .as_deref()
            .ok_or(ConfigError::Missing("PUBLIC_BASE_URL"))?;
        Ok(public_url(base, key))
    }

    /// Manifest URL; resolves whether or not the bundle has been published.
    pub fn hls_url(&self, video_id: &str) -> StorageResult<String> {
        self.public_url(&self.manifest_key(video_id))
    }

    pub fn poster_url(&self, video_id: &str) -> StorageResult<String> {
        self.public_url(&self.poster_key(video_id))
    }
}

/// Facade over a single bucket.
#[derive(Clone)]
pub struct StoreClient {
    store: Arc<dyn ObjectStore>,
    layout: StoreLayout,
}

impl StoreClient {
    pub fn new(store: Arc<dyn ObjectStore>, layout: StoreLayout) -> Self {
        Self { store, layout }
    }

    pub fn bucket(&self) -> &str {
        self.store.bucket()
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// List every object under `prefix` (default: the source prefix), following
    /// continuation tokens until the store reports no more pages.
    pub async fn list_source_objects(
        &self,
        prefix: Option<&str>,
    ) -> StorageResult<Vec<SourceObject>> {
        let prefix = prefix.unwrap_or(&self.layout.source_prefix);
        let folder = keys::folder_prefix(prefix);

        let mut objects = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .store
                .list_page(folder.as_deref(), token.as_deref())
                .await?;
            pages += 1;
            objects.extend(page.objects);

            match page.next_token {
                Some(next) if token.as_deref() == Some(next.as_str()) => {
                    return Err(StorageError::transfer(
                        "list",
                        format!("continuation token did not advance after page {}", pages),
                    ));
                }
                Some(next) => token = Some(next),
                None => break,
            }
        }

        tracing::debug!(
            bucket = %self.bucket(),
            prefix = ?folder,
            pages = pages,
            count = objects.len(),
            "Listed source objects"
        );

        Ok(objects)
    }

    pub async fn head(&self, key: &str) -> StorageResult<ObjectHead> {
        self.store.head(key).await
    }

    /// Returns true when the object exists, false on `NotFound`.
    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.store.head(key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn download_to_path(&self, key: &str, destination: &Path) -> StorageResult<u64> {
        self.store.download_to_path(key, destination).await
    }

    pub async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        cache_control: Option<&str>,
    ) -> StorageResult<()> {
        self.store.put(key, data, content_type, cache_control).await
    }

    /// Sign a single PUT for `key`, valid for the configured expiry.
    pub async fn presign_upload(&self, key: &str, content_type: &str) -> StorageResult<String> {
        self.store
            .presign_put(key, content_type, self.layout.upload_url_expiry)
            .await
    }

    /// Issue a direct-upload grant under the inbox prefix.
    ///
    /// The filename is sanitized into a single segment and prefixed with the current
    /// time in milliseconds. Keys that would land under the HLS or poster prefixes are
    /// rejected.
    pub async fn create_upload_url(
        &self,
        filename: &str,
        content_type: &str,
    ) -> StorageResult<CreateUploadUrlResult> {
        let key = keys::inbox_key(&self.layout.upload_prefix, filename, Utc::now())?;
        keys::ensure_not_reserved(&key, &self.layout.reserved_prefixes())?;

        let url = self.presign_upload(&key, content_type).await?;

        tracing::info!(
            bucket = %self.bucket(),
            key = %key,
            expires_in = self.layout.upload_url_expiry.as_secs(),
            "Issued upload URL"
        );

        Ok(CreateUploadUrlResult {
            url,
            key,
            bucket: self.bucket().to_string(),
            expires_in: self.layout.upload_url_expiry.as_secs(),
        })
    }

    pub fn video_id(&self, key: &str) -> String {
        self.layout.video_id(key)
    }

    pub fn manifest_key(&self, video_id: &str) -> String {
        self.layout.manifest_key(video_id)
    }

    pub fn hls_object_key(&self, video_id: &str, relative: &str) -> String {
        self.layout.hls_object_key(video_id, relative)
    }

    pub fn poster_key(&self, video_id: &str) -> String {
        self.layout.poster_key(video_id)
    }

    pub fn public_url(&self, key: &str) -> StorageResult<String> {
        self.layout.public_url(key)
    }

    pub fn hls_url(&self, video_id: &str) -> StorageResult<String> {
        self.layout.hls_url(video_id)
    }

    pub fn poster_url(&self, video_id: &str) -> StorageResult<String> {
        self.layout.poster_url(video_id)
    }

    /// Lightweight probe: list at most one object.
    pub async fn probe(&self) -> StorageResult<()> {
        self.store.probe().await
    }
}

fn public_url(base: &str, key: &str) -> String {
    let base = base.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("http://") {
        format!("https://{}", rest)
    } else if base.starts_with("https://") {
        base.to_string()
    } else {
        format!("https://{}", base)
    };

    let path = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");

    format!("{}/{}", base, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryObjectStore;
    use chrono::{TimeZone, Utc};

    fn layout() -> StoreLayout {
        StoreLayout {
            public_base_url: Some("https://cdn.example.com".to_string()),
            source_prefix: "videos".to_string(),
            upload_prefix: "videos/inbox".to_string(),
            hls_prefix: "hls".to_string(),
            poster_prefix: "poster".to_string(),
            video_id_tag: "b2".to_string(),
            upload_url_expiry: Duration::from_secs(600),
        }
    }

    fn client_with(store: Arc<InMemoryObjectStore>) -> StoreClient {
        StoreClient::new(store, layout())
    }

    #[tokio::test]
    async fn test_listing_follows_every_page() {
        let store = Arc::new(InMemoryObjectStore::new("clips").with_page_size(3));
        for i in 0..10 {
            store.insert(format!("videos/raw/clip{:02}.mp4", i), vec![1u8; 8], None);
        }
        store.insert("hls/b2_x/master.m3u8", vec![1u8; 8], None);
        let client = client_with(store.clone());

        let objects = client.list_source_objects(None).await.unwrap();

        assert_eq!(objects.len(), 10);
        let mut keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
        keys.dedup();
        assert_eq!(keys.len(), 10);
        assert_eq!(store.list_calls(), 4);
    }

    #[tokio::test]
    async fn test_listing_custom_prefix_is_a_folder() {
        let store = Arc::new(InMemoryObjectStore::new("clips"));
        store.insert("videos/raw/a.mp4", vec![1u8], None);
        store.insert("videos/rawhide/b.mp4", vec![1u8], None);
        let client = client_with(store);

        let objects = client.list_source_objects(Some("/videos/raw/")).await.unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].key, "videos/raw/a.mp4");
    }

    #[tokio::test]
    async fn test_create_upload_url_uses_inbox_and_expiry() {
        let store = Arc::new(InMemoryObjectStore::new("clips"));
        let client = client_with(store);

        let result = client
            .create_upload_url("my clip.mp4", "video/mp4")
            .await
            .unwrap();

        assert!(result.key.starts_with("videos/inbox/"));
        assert!(result.key.ends_with("-my_clip.mp4"));
        assert_eq!(result.bucket, "clips");
        assert_eq!(result.expires_in, 600);
        assert!(result.url.contains("X-Amz-Expires=600"));
    }

    #[tokio::test]
    async fn test_create_upload_url_rejects_reserved_inbox() {
        let store = Arc::new(InMemoryObjectStore::new("clips"));
        let mut layout = layout();
        layout.upload_prefix = "hls/inbox".to_string();
        let client = StoreClient::new(store, layout);

        let result = client.create_upload_url("a.mp4", "video/mp4").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_playback_urls_are_deterministic() {
        let client = client_with(Arc::new(InMemoryObjectStore::new("clips")));
        let id = client.video_id("videos/raw/clip123.mp4");

        assert_eq!(
            client.hls_url(&id).unwrap(),
            format!("https://cdn.example.com/hls/{}/master.m3u8", id)
        );
        assert_eq!(
            client.poster_url(&id).unwrap(),
            format!("https://cdn.example.com/poster/{}.jpg", id)
        );
    }

    #[test]
    fn test_public_url_forces_https_and_encodes() {
        assert_eq!(
            public_url("http://cdn.example.com/", "videos/raw/my clip.mp4"),
            "https://cdn.example.com/videos/raw/my%20clip.mp4"
        );
        assert_eq!(
            public_url("f005.backblazeb2.com/file/clips", "a.mp4"),
            "https://f005.backblazeb2.com/file/clips/a.mp4"
        );
    }

    #[test]
    fn test_missing_base_url_is_named() {
        let mut layout = layout();
        layout.public_base_url = None;
        let client = StoreClient::new(Arc::new(InMemoryObjectStore::new("clips")), layout);

        let err = client.hls_url("b2_x").unwrap_err();
        assert!(err.to_string().contains("PUBLIC_BASE_URL"));
    }

    #[tokio::test]
    async fn test_exists() {
        let store = Arc::new(InMemoryObjectStore::new("clips"));
        store.insert(
            "hls/b2_x/master.m3u8",
            vec![1u8],
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        );
        let client = client_with(store);
        assert!(client.exists("hls/b2_x/master.m3u8").await.unwrap());
        assert!(!client.exists("hls/b2_y/master.m3u8").await.unwrap());
    }
}
