//! Object-storage provider: source files live directly in an S3-compatible bucket and
//! HLS bundles are packaged on demand next to them.

use async_trait::async_trait;
use clipvault_core::config::normalize_prefix;
use clipvault_core::constants::has_source_video_extension;
use clipvault_core::models::sort_newest_first;
use clipvault_core::{
    CreateUploadUrlRequest, CreateUploadUrlResult, ProviderKind, StorageSettings, VideoFormat,
    VideoResource,
};
use clipvault_storage::{create_store_client, StoreClient, StoreLayout};
use tokio::sync::OnceCell;

use crate::error::ProviderError;
use crate::provider::{validate_upload_request, VideoProvider};

pub struct ObjectStorageProvider {
    settings: StorageSettings,
    client: OnceCell<StoreClient>,
}

impl ObjectStorageProvider {
    /// Cheap and infallible; the store client is built on first use.
    pub fn new(settings: StorageSettings) -> Self {
        Self {
            settings,
            client: OnceCell::new(),
        }
    }

    /// Use an already-built client (tests, or callers sharing one client).
    pub fn with_client(settings: StorageSettings, client: StoreClient) -> Self {
        Self {
            settings,
            client: OnceCell::new_with(Some(client)),
        }
    }

    async fn client(&self) -> Result<&StoreClient, ProviderError> {
        self.client
            .get_or_try_init(|| async { create_store_client(&self.settings) })
            .await
            .map_err(ProviderError::from)
    }

    fn layout(&self) -> Result<StoreLayout, ProviderError> {
        match self.client.get() {
            Some(client) => Ok(client.layout().clone()),
            None => Ok(StoreLayout::from_settings(&self.settings)?),
        }
    }

    async fn to_resource(
        &self,
        client: &StoreClient,
        object: clipvault_core::SourceObject,
        folder: Option<String>,
    ) -> Result<VideoResource, ProviderError> {
        let id = client.video_id(&object.key);
        let url = client.public_url(&object.key)?;
        let video = VideoResource::new(
            id.clone(),
            VideoFormat::Mp4,
            object.created_at(),
            object.size,
            url,
        )
        .with_asset_folder(folder);

        if !self.settings.list_check_packaged {
            return Ok(video);
        }

        if client.exists(&client.manifest_key(&id)).await? {
            let mut packaged = video.with_playback(client.hls_url(&id)?, client.poster_url(&id)?);
            packaged.format = VideoFormat::Hls;
            Ok(packaged)
        } else {
            Ok(video)
        }
    }
}

#[async_trait]
impl VideoProvider for ObjectStorageProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ObjectStorage
    }

    #[tracing::instrument(skip(self))]
    async fn list_source_videos(
        &self,
        prefix: Option<&str>,
    ) -> Result<Vec<VideoResource>, ProviderError> {
        let client = self.client().await?;
        let prefix = match prefix {
            Some(prefix) => normalize_prefix(prefix),
            None => client.layout().source_prefix.clone(),
        };
        let folder = Some(prefix.clone()).filter(|p| !p.is_empty());

        let objects = client.list_source_objects(Some(&prefix)).await?;
        let total = objects.len();

        let mut videos = Vec::new();
        for object in objects
            .into_iter()
            .filter(|object| has_source_video_extension(&object.key))
        {
            videos.push(self.to_resource(client, object, folder.clone()).await?);
        }
        sort_newest_first(&mut videos);

        tracing::info!(
            bucket = %client.bucket(),
            prefix = %prefix,
            objects = total,
            videos = videos.len(),
            "Listed source videos"
        );

        Ok(videos)
    }

    async fn create_source_upload_url(
        &self,
        request: &CreateUploadUrlRequest,
    ) -> Result<CreateUploadUrlResult, ProviderError> {
        validate_upload_request(request, &self.settings.allowed_content_types)?;
        let client = self.client().await?;
        Ok(client
            .create_upload_url(request.filename.trim(), &request.content_type)
            .await?)
    }

    fn get_hls_url(&self, video_id: &str) -> Result<String, ProviderError> {
        Ok(self.layout()?.hls_url(video_id)?)
    }

    fn get_poster_url(&self, video_id: &str) -> Result<String, ProviderError> {
        Ok(self.layout()?.poster_url(video_id)?)
    }
}
