//! Video provider interface.

use async_trait::async_trait;
use clipvault_core::constants::{has_source_video_extension, SOURCE_VIDEO_EXTENSIONS};
use clipvault_core::{CreateUploadUrlRequest, CreateUploadUrlResult, ProviderKind, VideoResource};

use crate::error::ProviderError;

/// Capability contract implemented once per back-end.
///
/// Required configuration is demanded at first use, so constructing a provider never
/// fails. URL resolution never touches the network and succeeds whether or not the
/// target has been published yet.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Ready-to-play videos, newest first by `created_at` string comparison.
    async fn list_source_videos(
        &self,
        prefix: Option<&str>,
    ) -> Result<Vec<VideoResource>, ProviderError>;

    /// Issue a one-time write credential for a new source file.
    async fn create_source_upload_url(
        &self,
        request: &CreateUploadUrlRequest,
    ) -> Result<CreateUploadUrlResult, ProviderError>;

    fn get_hls_url(&self, video_id: &str) -> Result<String, ProviderError>;

    fn get_poster_url(&self, video_id: &str) -> Result<String, ProviderError>;
}

/// Media type without parameters, lowercased: `Video/MP4; codecs=avc1` -> `video/mp4`.
pub(crate) fn base_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Shared request checks: non-empty filename with a listable extension and an
/// allowed content type.
pub(crate) fn validate_upload_request(
    request: &CreateUploadUrlRequest,
    allowed_content_types: &[String],
) -> Result<(), ProviderError> {
    let filename = request.filename.trim();
    if filename.is_empty() {
        return Err(ProviderError::InvalidInput("filename is required".to_string()));
    }

    let content_type = base_content_type(&request.content_type);
    if !allowed_content_types.iter().any(|allowed| *allowed == content_type) {
        return Err(ProviderError::InvalidInput(format!(
            "content type '{}' is not allowed",
            content_type
        )));
    }

    if !has_source_video_extension(filename) {
        return Err(ProviderError::InvalidInput(format!(
            "filename must end in one of: {}",
            SOURCE_VIDEO_EXTENSIONS.join(", ")
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        vec!["video/mp4".to_string(), "video/quicktime".to_string()]
    }

    fn request(filename: &str, content_type: &str) -> CreateUploadUrlRequest {
        CreateUploadUrlRequest {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
        }
    }

    #[test]
    fn test_accepts_allowed_video() {
        assert!(validate_upload_request(&request("clip.mp4", "video/mp4"), &allowed()).is_ok());
        assert!(
            validate_upload_request(&request("IMG_0001.MOV", "Video/QuickTime"), &allowed())
                .is_ok()
        );
    }

    #[test]
    fn test_rejects_bad_requests() {
        for (filename, content_type) in [
            ("", "video/mp4"),
            ("   ", "video/mp4"),
            ("clip.mp4", "image/png"),
            ("notes.txt", "video/mp4"),
        ] {
            let result = validate_upload_request(&request(filename, content_type), &allowed());
            assert!(
                matches!(result, Err(ProviderError::InvalidInput(_))),
                "{} / {}",
                filename,
                content_type
            );
        }
    }

    #[test]
    fn test_base_content_type_strips_parameters() {
        assert_eq!(base_content_type("Video/MP4; codecs=avc1"), "video/mp4");
    }
}
