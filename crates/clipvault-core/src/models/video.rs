use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::constants::{EPOCH_TIMESTAMP, RESOURCE_TYPE_VIDEO};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    /// Untouched source object
    Mp4,
    /// Managed-streaming asset
    Stream,
    /// Packaged adaptive-bitrate bundle
    Hls,
}

impl Display for VideoFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            VideoFormat::Mp4 => write!(f, "mp4"),
            VideoFormat::Stream => write!(f, "stream"),
            VideoFormat::Hls => write!(f, "hls"),
        }
    }
}

/// Canonical, provider-neutral description of a playable asset.
///
/// `public_id`/`asset_id` and `url`/`secure_url` are duplicated for older callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoResource {
    pub public_id: String,
    pub asset_id: String,
    pub format: VideoFormat,
    pub resource_type: String,
    pub created_at: String,
    pub bytes: u64,
    pub url: String,
    pub secure_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hls_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_folder: Option<String>,
}

impl VideoResource {
    pub fn new(
        id: impl Into<String>,
        format: VideoFormat,
        created_at: Option<String>,
        bytes: Option<u64>,
        url: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let url = url.into();
        Self {
            public_id: id.clone(),
            asset_id: id,
            format,
            resource_type: RESOURCE_TYPE_VIDEO.to_string(),
            created_at: created_at.unwrap_or_else(|| EPOCH_TIMESTAMP.to_string()),
            bytes: bytes.unwrap_or(0),
            secure_url: url.clone(),
            url,
            hls_url: None,
            poster_url: None,
            asset_folder: None,
        }
    }

    pub fn with_playback(mut self, hls_url: String, poster_url: String) -> Self {
        self.hls_url = Some(hls_url);
        self.poster_url = Some(poster_url);
        self
    }

    pub fn with_asset_folder(mut self, folder: Option<String>) -> Self {
        self.asset_folder = folder.filter(|f| !f.is_empty());
        self
    }
}

/// Raw listing record produced by the object-store facade.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceObject {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: Option<u64>,
}

impl SourceObject {
    /// ISO-8601 rendering of `last_modified`, if the store reported one.
    pub fn created_at(&self) -> Option<String> {
        self.last_modified
            .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// Order newest-first by plain string comparison of `created_at`.
///
/// No timestamp parsing: malformed values and ties sort lexicographically.
pub fn sort_newest_first(videos: &mut [VideoResource]) {
    videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn video(id: &str, created_at: &str) -> VideoResource {
        VideoResource::new(
            id,
            VideoFormat::Mp4,
            Some(created_at.to_string()),
            Some(1),
            format!("https://cdn.example.com/{}", id),
        )
    }

    #[test]
    fn test_new_duplicates_identifiers_and_urls() {
        let v = VideoResource::new("b2_abc", VideoFormat::Mp4, None, None, "https://x/y.mp4");
        assert_eq!(v.public_id, v.asset_id);
        assert_eq!(v.url, v.secure_url);
        assert_eq!(v.resource_type, "video");
        assert_eq!(v.created_at, EPOCH_TIMESTAMP);
        assert_eq!(v.bytes, 0);
        assert!(v.hls_url.is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let v = video("b2_abc", "2024-01-01T00:00:00.000Z")
            .with_asset_folder(Some("videos/raw".to_string()));
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["format"], "mp4");
        assert_eq!(json["asset_folder"], "videos/raw");
        assert!(json.get("hls_url").is_none());

        let packaged = v.with_playback("h".into(), "p".into());
        let json = serde_json::to_value(&packaged).unwrap();
        assert_eq!(json["hls_url"], "h");
        assert_eq!(json["poster_url"], "p");
    }

    #[test]
    fn test_sort_newest_first_is_lexicographic() {
        let mut videos = vec![
            video("a", "2024-01-01T00:00:00.000Z"),
            video("b", "2024-03-01T00:00:00.000Z"),
            video("c", "not-a-date"),
            video("d", "2023-12-31T23:59:59.000Z"),
        ];
        sort_newest_first(&mut videos);
        let order: Vec<&str> = videos.iter().map(|v| v.public_id.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "a", "d"]);
    }

    #[test]
    fn test_source_object_created_at() {
        let object = SourceObject {
            key: "videos/raw/clip123.mp4".into(),
            last_modified: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            size: Some(10 * 1024 * 1024),
        };
        assert_eq!(
            object.created_at().as_deref(),
            Some("2024-01-01T00:00:00.000Z")
        );

        let bare = SourceObject {
            key: "k.mp4".into(),
            last_modified: None,
            size: None,
        };
        assert!(bare.created_at().is_none());
    }
}
