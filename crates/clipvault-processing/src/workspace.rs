//! Scoped per-job workspace.
//!
//! One uniquely named directory per packaging run, removed on every exit path. An
//! explicit `cleanup` logs removal failures; dropping the workspace (for example when
//! the caller abandons the job future) removes it silently.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use clipvault_core::constants::POSTER_EXTENSION;

const HLS_DIR: &str = "hls";
const SOURCE_STEM: &str = "source";

pub struct JobWorkspace {
    dir: TempDir,
}

impl JobWorkspace {
    /// Create `clipvault-{video_id}-XXXXXX` under `parent`, or the system temp dir.
    pub fn create(parent: Option<&Path>, video_id: &str) -> std::io::Result<Self> {
        let prefix = format!("clipvault-{}-", video_id);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        tracing::debug!(path = %dir.path().display(), "Created job workspace");
        Ok(Self { dir })
    }

    /// `create` on the blocking pool, for use from async tasks.
    pub async fn acquire(parent: Option<PathBuf>, video_id: String) -> std::io::Result<Self> {
        tokio::task::spawn_blocking(move || Self::create(parent.as_deref(), &video_id))
            .await
            .map_err(std::io::Error::other)?
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Local copy of the source, keeping its extension so the transcoder can sniff it.
    pub fn source_path(&self, source_key: &str) -> PathBuf {
        let extension = Path::new(source_key)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension {
            Some(ext) => self.path().join(format!("{}.{}", SOURCE_STEM, ext)),
            None => self.path().join(SOURCE_STEM),
        }
    }

    pub fn poster_path(&self) -> PathBuf {
        self.path().join(format!("poster.{}", POSTER_EXTENSION))
    }

    pub fn hls_dir(&self) -> PathBuf {
        self.path().join(HLS_DIR)
    }

    /// `cleanup` on the blocking pool.
    pub async fn release(self) {
        if let Err(e) = tokio::task::spawn_blocking(move || self.cleanup()).await {
            tracing::warn!(error = %e, "Workspace cleanup task failed");
        }
    }

    /// Remove the workspace. Failures are logged, never returned.
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed job workspace"),
            Err(e) => tracing::warn!(
                error = %e,
                path = %path.display(),
                "Failed to remove job workspace"
            ),
        }
    }
}
