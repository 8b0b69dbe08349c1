//! Managed-streaming provider (Cloudflare Stream compatible API).
//!
//! The back-end owns ingestion, transcoding and playback. This provider only proxies
//! listing and direct-upload creation and builds delivery URLs from the video UID.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use clipvault_core::models::sort_newest_first;
use clipvault_core::{
    CreateUploadUrlRequest, CreateUploadUrlResult, ProviderKind, StreamSettings, VideoFormat,
    VideoResource,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use crate::error::ProviderError;
use crate::provider::{validate_upload_request, VideoProvider};

/// `bucket` reported for managed uploads, which have no bucket of their own.
pub const MANAGED_BUCKET: &str = "stream";

const READY_STATE: &str = "ready";

/// Most videos the list endpoint returns per request.
const LIST_PAGE_LIMIT: usize = 1000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Validity of a direct-upload URL (10 minutes).
const DIRECT_UPLOAD_EXPIRY_SECS: u64 = 600;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<T>,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamVideo {
    uid: String,
    #[serde(default)]
    ready_to_stream: bool,
    #[serde(default)]
    status: Option<StreamStatus>,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    meta: Option<StreamMeta>,
}

#[derive(Debug, Deserialize)]
struct StreamStatus {
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamMeta {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectUpload {
    #[serde(rename = "uploadURL")]
    upload_url: String,
    uid: String,
}

impl StreamVideo {
    fn is_ready(&self) -> bool {
        self.ready_to_stream
            && self
                .status
                .as_ref()
                .and_then(|status| status.state.as_deref())
                == Some(READY_STATE)
    }

    fn name(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|meta| meta.name.as_deref())
    }
}

pub struct ManagedStreamProvider {
    settings: StreamSettings,
    allowed_content_types: Vec<String>,
    http_client: Client,
}

impl Debug for ManagedStreamProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ManagedStreamProvider")
            .field("settings", &self.settings)
            .finish()
    }
}

impl ManagedStreamProvider {
    /// Cheap and infallible; credentials are demanded on first API call.
    pub fn new(settings: StreamSettings, allowed_content_types: Vec<String>) -> Self {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });
        Self {
            settings,
            allowed_content_types,
            http_client,
        }
    }

    fn account_url(&self, path: &str) -> Result<String, ProviderError> {
        Ok(format!(
            "{}/accounts/{}/{}",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.account_id()?,
            path
        ))
    }

    /// Every video on the account, walking back in time with `before=<oldest created>`
    /// until a short page. Videos repeated across a page boundary are kept once.
    async fn fetch_all(&self) -> Result<Vec<StreamVideo>, ProviderError> {
        let url = self.account_url("stream")?;
        let token = self.settings.api_token()?;

        let mut listing: Vec<StreamVideo> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut before: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut request = self.http_client.get(&url).bearer_auth(token);
            if let Some(cursor) = before.as_deref() {
                request = request.query(&[("before", cursor)]);
            }
            let page: Vec<StreamVideo> = Self::parse(request.send().await?).await?;
            pages += 1;

            let page_len = page.len();
            let oldest = page.iter().filter_map(|video| video.created.clone()).min();
            listing.extend(page.into_iter().filter(|video| seen.insert(video.uid.clone())));

            if page_len < LIST_PAGE_LIMIT {
                break;
            }
            match oldest {
                Some(oldest) if before.as_deref() != Some(oldest.as_str()) => before = Some(oldest),
                _ => {
                    return Err(ProviderError::Api {
                        status: 200,
                        message: format!("listing cursor did not advance after page {}", pages),
                    })
                }
            }
        }

        tracing::debug!(pages, count = listing.len(), "Fetched managed stream listing");
        Ok(listing)
    }

    async fn parse<T>(response: reqwest::Response) -> Result<T, ProviderError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let envelope: Envelope<T> = response.json().await?;
        envelope.result.ok_or_else(|| ProviderError::Api {
            status: status.as_u16(),
            message: if envelope.errors.is_empty() {
                "response carried no result".to_string()
            } else {
                join_messages(&envelope.errors)
            },
        })
    }
}

/// Prefer the API's structured error messages over the raw body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Envelope<serde_json::Value>>(body) {
        Ok(envelope) if !envelope.errors.is_empty() => join_messages(&envelope.errors),
        _ => body.trim().chars().take(500).collect(),
    }
}

fn join_messages(errors: &[ApiMessage]) -> String {
    errors
        .iter()
        .map(|e| match e.code {
            Some(code) => format!("{} ({})", e.message, code),
            None => e.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn hls_url(delivery_base: &str, video_id: &str) -> String {
    format!("{}/{}/manifest/video.m3u8", delivery_base.trim_end_matches('/'), video_id)
}

fn poster_url(delivery_base: &str, video_id: &str) -> String {
    format!(
        "{}/{}/thumbnails/thumbnail.jpg",
        delivery_base.trim_end_matches('/'),
        video_id
    )
}

/// Keep ready videos whose name starts with `prefix`, newest first.
fn ready_videos(
    listing: Vec<StreamVideo>,
    prefix: Option<&str>,
    delivery_base: &str,
) -> Vec<VideoResource> {
    let mut videos: Vec<VideoResource> = listing
        .into_iter()
        .filter(StreamVideo::is_ready)
        .filter(|video| match prefix {
            Some(prefix) => video.name().is_some_and(|name| name.starts_with(prefix)),
            None => true,
        })
        .map(|video| {
            let hls = hls_url(delivery_base, &video.uid);
            let poster = poster_url(delivery_base, &video.uid);
            VideoResource::new(
                video.uid.clone(),
                VideoFormat::Stream,
                video.created.clone(),
                video.size,
                hls.clone(),
            )
            .with_playback(hls, poster)
            .with_asset_folder(prefix.map(String::from))
        })
        .collect();
    sort_newest_first(&mut videos);
    videos
}

#[async_trait]
impl VideoProvider for ManagedStreamProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ManagedStream
    }

    #[tracing::instrument(skip(self))]
    async fn list_source_videos(
        &self,
        prefix: Option<&str>,
    ) -> Result<Vec<VideoResource>, ProviderError> {
        let delivery_base = self.settings.delivery_base()?;
        let listing = self.fetch_all().await?;
        let total = listing.len();

        let videos = ready_videos(listing, prefix.filter(|p| !p.is_empty()), delivery_base);
        tracing::info!(total, ready = videos.len(), "Listed managed stream videos");
        Ok(videos)
    }

    /// The returned URL takes a single multipart POST (form field `file`); the back-end
    /// allocates the UID, returned as `key`.
    async fn create_source_upload_url(
        &self,
        request: &CreateUploadUrlRequest,
    ) -> Result<CreateUploadUrlResult, ProviderError> {
        validate_upload_request(request, &self.allowed_content_types)?;
        let filename = request.filename.trim();

        let expiry = Utc::now() + chrono::Duration::seconds(DIRECT_UPLOAD_EXPIRY_SECS as i64);
        let body = json!({
            "maxDurationSeconds": self.settings.max_duration_secs,
            "expiry": expiry.to_rfc3339_opts(SecondsFormat::Secs, true),
            "meta": { "name": filename },
        });

        let url = self.account_url("stream/direct_upload")?;
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.settings.api_token()?)
            .json(&body)
            .send()
            .await?;
        let upload: DirectUpload = Self::parse(response).await?;

        tracing::info!(uid = %upload.uid, "Created managed direct upload");

        Ok(CreateUploadUrlResult {
            url: upload.upload_url,
            key: upload.uid,
            bucket: MANAGED_BUCKET.to_string(),
            expires_in: DIRECT_UPLOAD_EXPIRY_SECS,
        })
    }

    fn get_hls_url(&self, video_id: &str) -> Result<String, ProviderError> {
        Ok(hls_url(self.settings.delivery_base()?, video_id))
    }

    fn get_poster_url(&self, video_id: &str) -> Result<String, ProviderError> {
        Ok(poster_url(self.settings.delivery_base()?, video_id))
    }
}
