//! Shared constants for keys, content types and cache headers.

/// File extensions recognized as source videos (lowercase, without the dot).
pub const SOURCE_VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "webm", "mkv"];

/// Fallback `created_at` when a store reports no timestamp.
pub const EPOCH_TIMESTAMP: &str = "1970-01-01T00:00:00.000Z";

/// `resource_type` reported for every asset handled by this core.
pub const RESOURCE_TYPE_VIDEO: &str = "video";

pub const MASTER_MANIFEST_NAME: &str = "master.m3u8";
pub const VARIANT_MANIFEST_NAME: &str = "index.m3u8";
pub const POSTER_EXTENSION: &str = "jpg";

pub const CONTENT_TYPE_HLS_MANIFEST: &str = "application/vnd.apple.mpegurl";
pub const CONTENT_TYPE_MPEG_TS: &str = "video/mp2t";
pub const CONTENT_TYPE_FMP4_SEGMENT: &str = "video/iso.segment";
pub const CONTENT_TYPE_MP4: &str = "video/mp4";
pub const CONTENT_TYPE_JPEG: &str = "image/jpeg";
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// Manifests stay short-lived so a re-package is picked up quickly.
pub const CACHE_CONTROL_MANIFEST: &str = "public, max-age=60";
pub const CACHE_CONTROL_IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// Default lifetime of a presigned upload URL (10 minutes).
pub const DEFAULT_UPLOAD_URL_EXPIRY_SECS: u64 = 600;

/// Returns true if `key` ends in a recognized source video extension (case-insensitive).
pub fn has_source_video_extension(key: &str) -> bool {
    key.rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            SOURCE_VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_extension_case_insensitive() {
        assert!(has_source_video_extension("videos/raw/clip123.mp4"));
        assert!(has_source_video_extension("videos/raw/CLIP.MOV"));
        assert!(!has_source_video_extension("videos/raw/notes.txt"));
        assert!(!has_source_video_extension("videos/raw/mp4"));
        assert!(!has_source_video_extension("hls/b2_abc/master.m3u8"));
    }
}
