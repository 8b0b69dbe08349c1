use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::error::TranscodeError;
use crate::video::ladder::Rendition;

/// External transcoding engine seam.
///
/// Implementations must stop work and release the child process when `cancel` fires.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Write a single JPEG frame taken `offset_secs` into `input`.
    async fn extract_poster(
        &self,
        input: &Path,
        output: &Path,
        offset_secs: f64,
        cancel: &CancellationToken,
    ) -> Result<(), TranscodeError>;

    /// Whether `input` carries at least one audio stream.
    async fn has_audio(&self, input: &Path, cancel: &CancellationToken)
        -> Result<bool, TranscodeError>;

    /// Write one `{name}/index.m3u8` plus segments per rendition into `output_dir`,
    /// and ideally a `master.m3u8` at its root. Renditions are video-only when
    /// `has_audio` is false.
    async fn transcode_hls(
        &self,
        input: &Path,
        output_dir: &Path,
        ladder: &[Rendition],
        segment_duration: u64,
        has_audio: bool,
        cancel: &CancellationToken,
    ) -> Result<(), TranscodeError>;
}
