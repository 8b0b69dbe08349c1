//! Packaging pipeline: download → poster → transcode → publish → cleanup.
//!
//! Each invocation is linear and runs on the caller's task. Any failure skips the
//! remaining steps; the workspace is removed either way. Objects published before a
//! failure are not rolled back, and a rerun for the same source overwrites them in
//! place because every output key derives from the source key alone.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use clipvault_core::constants::{
    CACHE_CONTROL_IMMUTABLE, CACHE_CONTROL_MANIFEST, CONTENT_TYPE_FMP4_SEGMENT,
    CONTENT_TYPE_HLS_MANIFEST, CONTENT_TYPE_JPEG, CONTENT_TYPE_MP4, CONTENT_TYPE_MPEG_TS,
    CONTENT_TYPE_OCTET_STREAM, MASTER_MANIFEST_NAME,
};
use clipvault_core::{PackagingResult, PackagingSettings};
use clipvault_storage::{StorageError, StoreClient};

use crate::error::{PackagingError, TranscodeError};
use crate::video::ladder::{master_playlist, Rendition, FIXED_LADDER};
use crate::video::transcoder::Transcoder;
use crate::workspace::JobWorkspace;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub segment_duration: u64,
    pub poster_offset_secs: f64,
    pub work_dir: Option<PathBuf>,
}

impl From<&PackagingSettings> for PipelineSettings {
    fn from(settings: &PackagingSettings) -> Self {
        Self {
            segment_duration: settings.hls_segment_duration,
            poster_offset_secs: settings.poster_offset_secs,
            work_dir: settings.work_dir.clone(),
        }
    }
}

pub struct PackagingPipeline {
    client: StoreClient,
    transcoder: Arc<dyn Transcoder>,
    settings: PipelineSettings,
}

impl PackagingPipeline {
    pub fn new(
        client: StoreClient,
        transcoder: Arc<dyn Transcoder>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            client,
            transcoder,
            settings,
        }
    }

    /// Package `source_key` into an HLS bundle plus poster and publish both.
    ///
    /// Concurrent runs for different sources never share keys or workspaces. Two runs
    /// for the same source race on publish and the last writer wins.
    #[tracing::instrument(skip(self, cancel), fields(video_id = tracing::field::Empty))]
    pub async fn package(
        &self,
        source_key: &str,
        cancel: &CancellationToken,
    ) -> Result<PackagingResult, PackagingError> {
        let start = std::time::Instant::now();
        let video_id = self.client.video_id(source_key);
        tracing::Span::current().record("video_id", video_id.as_str());

        let workspace =
            JobWorkspace::acquire(self.settings.work_dir.clone(), video_id.clone()).await?;
        let result = self.run(&workspace, source_key, &video_id, cancel).await;
        workspace.release().await;

        match &result {
            Ok(packaged) => tracing::info!(
                video_id = %video_id,
                uploaded_count = packaged.uploaded_count,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Packaging completed"
            ),
            Err(e) => tracing::error!(
                error = %e,
                video_id = %video_id,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Packaging failed"
            ),
        }

        result
    }

    async fn run(
        &self,
        workspace: &JobWorkspace,
        source_key: &str,
        video_id: &str,
        cancel: &CancellationToken,
    ) -> Result<PackagingResult, PackagingError> {
        let input = workspace.source_path(source_key);
        self.download(source_key, &input).await?;
        tracing::info!(stage = "downloaded", video_id = %video_id, "Source downloaded");

        let poster = workspace.poster_path();
        self.transcoder
            .extract_poster(&input, &poster, self.settings.poster_offset_secs, cancel)
            .await?;
        ensure_exists(&poster).await?;
        tracing::info!(stage = "poster_generated", video_id = %video_id, "Poster extracted");

        let has_audio = self.transcoder.has_audio(&input, cancel).await?;
        if !has_audio {
            tracing::info!(video_id = %video_id, "Source has no audio track, packaging video only");
        }

        let hls_dir = workspace.hls_dir();
        tokio::fs::create_dir_all(&hls_dir).await?;
        self.transcoder
            .transcode_hls(
                &input,
                &hls_dir,
                &FIXED_LADDER,
                self.settings.segment_duration,
                has_audio,
                cancel,
            )
            .await?;
        ensure_master_playlist(&hls_dir, &FIXED_LADDER).await?;
        tracing::info!(stage = "transcoded", video_id = %video_id, "HLS renditions generated");

        if cancel.is_cancelled() {
            return Err(TranscodeError::Cancelled { stage: "publish" }.into());
        }

        let mut uploaded_count = 0usize;
        for relative in collect_files(&hls_dir).await? {
            let key = self.client.hls_object_key(video_id, &relative);
            let data = tokio::fs::read(hls_dir.join(&relative)).await?;
            self.client
                .put_object(
                    &key,
                    Bytes::from(data),
                    content_type_for(&relative),
                    Some(cache_control_for(&relative)),
                )
                .await?;
            uploaded_count += 1;
            tracing::debug!(key = %key, "Published HLS object");
        }

        let poster_key = self.client.poster_key(video_id);
        let data = tokio::fs::read(&poster).await?;
        self.client
            .put_object(
                &poster_key,
                Bytes::from(data),
                CONTENT_TYPE_JPEG,
                Some(CACHE_CONTROL_IMMUTABLE),
            )
            .await?;
        uploaded_count += 1;
        tracing::info!(stage = "uploaded", video_id = %video_id, uploaded_count, "Bundle published");

        Ok(PackagingResult {
            video_id: video_id.to_string(),
            source_key: source_key.to_string(),
            manifest_key: self.client.manifest_key(video_id),
            poster_key,
            uploaded_count,
        })
    }

    /// Download and compare the written byte count against the store's reported size.
    async fn download(&self, source_key: &str, destination: &Path) -> Result<(), PackagingError> {
        let head = self.client.head(source_key).await?;
        let written = self.client.download_to_path(source_key, destination).await?;
        if let Some(expected) = head.size {
            if expected != written {
                return Err(StorageError::SizeMismatch {
                    key: source_key.to_string(),
                    expected,
                    actual: written,
                }
                .into());
            }
        }
        Ok(())
    }
}

async fn ensure_exists(path: &Path) -> Result<(), PackagingError> {
    if tokio::fs::try_exists(path).await? {
        Ok(())
    } else {
        Err(PackagingError::MissingOutput(path.to_path_buf()))
    }
}

/// Every rendition playlist must exist. A missing master playlist is written from the
/// ladder, and strays the transcoder left inside rendition directories are removed.
async fn ensure_master_playlist(hls_dir: &Path, ladder: &[Rendition]) -> Result<(), PackagingError> {
    for rendition in ladder {
        ensure_exists(&hls_dir.join(rendition.playlist_path())).await?;
    }

    let master = hls_dir.join(MASTER_MANIFEST_NAME);
    if tokio::fs::try_exists(&master).await? {
        return Ok(());
    }

    for rendition in ladder {
        let stray = hls_dir.join(rendition.name).join(MASTER_MANIFEST_NAME);
        if tokio::fs::try_exists(&stray).await? {
            tokio::fs::remove_file(&stray).await?;
        }
    }

    tracing::debug!(path = %master.display(), "Writing master playlist from ladder");
    tokio::fs::write(&master, master_playlist(ladder)).await?;
    Ok(())
}

/// Relative `/`-separated paths of every file under `root`, sorted.
async fn collect_files(root: &Path) -> std::io::Result<Vec<String>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
            } else if let Ok(relative) = path.strip_prefix(root) {
                let relative = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                files.push(relative);
            }
        }
    }

    files.sort();
    Ok(files)
}

fn extension(path: &str) -> String {
    path.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn content_type_for(path: &str) -> &'static str {
    match extension(path).as_str() {
        "m3u8" => CONTENT_TYPE_HLS_MANIFEST,
        "ts" => CONTENT_TYPE_MPEG_TS,
        "m4s" => CONTENT_TYPE_FMP4_SEGMENT,
        "mp4" => CONTENT_TYPE_MP4,
        "jpg" | "jpeg" => CONTENT_TYPE_JPEG,
        _ => CONTENT_TYPE_OCTET_STREAM,
    }
}

pub fn cache_control_for(path: &str) -> &'static str {
    if extension(path) == "m3u8" {
        CACHE_CONTROL_MANIFEST
    } else {
        CACHE_CONTROL_IMMUTABLE
    }
}
