//! Configuration module
//!
//! Settings are read once from the environment. Loading only fails on values that are
//! present but malformed; required values are kept as `Option` and demanded at first use
//! through the `require`-style accessors, which return `ConfigError::Missing` naming the
//! variable. This keeps provider selection cheap and side-effect free.

use std::env;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::DEFAULT_UPLOAD_URL_EXPIRY_SECS;
use crate::error::ConfigError;
use crate::provider_types::ProviderKind;

const SOURCE_PREFIX: &str = "videos/";
const UPLOAD_PREFIX: &str = "videos/inbox";
const HLS_PREFIX: &str = "hls";
const POSTER_PREFIX: &str = "poster";
const VIDEO_ID_TAG: &str = "b2";
const VIDEO_ALLOWED_CONTENT_TYPES: &str =
    "video/mp4,video/quicktime,video/webm,video/x-matroska,video/x-m4v";
const HLS_SEGMENT_DURATION: u64 = 6;
const POSTER_OFFSET_SECS: f64 = 2.0;
const STREAM_API_BASE: &str = "https://api.cloudflare.com/client/v4";
const STREAM_MAX_DURATION_SECS: u64 = 3600;

/// Object-store settings (used by the object-storage provider and the packaging pipeline)
#[derive(Clone)]
pub struct StorageSettings {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub bucket: Option<String>,
    pub public_base_url: Option<String>,
    /// Listing prefix for source objects, normalized without surrounding slashes
    pub source_prefix: String,
    /// Fixed "inbox" folder for direct uploads, normalized without surrounding slashes
    pub upload_prefix: String,
    pub hls_prefix: String,
    pub poster_prefix: String,
    pub video_id_tag: String,
    pub upload_url_expiry_secs: u64,
    pub allowed_content_types: Vec<String>,
    pub list_check_packaged: bool,
}

/// Packaging pipeline settings
#[derive(Clone, Debug)]
pub struct PackagingSettings {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub hls_segment_duration: u64,
    pub poster_offset_secs: f64,
    pub transcode_timeout_secs: Option<u64>,
    pub work_dir: Option<PathBuf>,
}

/// Managed-streaming back-end settings
#[derive(Clone)]
pub struct StreamSettings {
    pub account_id: Option<String>,
    pub api_token: Option<String>,
    pub api_base: String,
    pub delivery_base: Option<String>,
    pub max_duration_secs: u64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub provider: ProviderKind,
    pub storage: StorageSettings,
    pub packaging: PackagingSettings,
    pub stream: StreamSettings,
}

impl Config {
    /// Load configuration from the process environment (and a `.env` file if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let provider = match var("VIDEO_PROVIDER") {
            Some(value) => value.parse()?,
            None => ProviderKind::default(),
        };

        let storage = StorageSettings {
            endpoint: var("S3_ENDPOINT"),
            region: var("S3_REGION").or_else(|| var("AWS_REGION")),
            access_key_id: var("S3_ACCESS_KEY_ID"),
            secret_access_key: var("S3_SECRET_ACCESS_KEY"),
            bucket: var("S3_BUCKET"),
            public_base_url: var("PUBLIC_BASE_URL"),
            source_prefix: normalize_prefix(
                &var("SOURCE_PREFIX").unwrap_or_else(|| SOURCE_PREFIX.to_string()),
            ),
            upload_prefix: normalize_prefix(
                &var("UPLOAD_PREFIX").unwrap_or_else(|| UPLOAD_PREFIX.to_string()),
            ),
            hls_prefix: normalize_prefix(
                &var("HLS_PREFIX").unwrap_or_else(|| HLS_PREFIX.to_string()),
            ),
            poster_prefix: normalize_prefix(
                &var("POSTER_PREFIX").unwrap_or_else(|| POSTER_PREFIX.to_string()),
            ),
            video_id_tag: var("VIDEO_ID_TAG").unwrap_or_else(|| VIDEO_ID_TAG.to_string()),
            upload_url_expiry_secs: parse_or(
                "UPLOAD_URL_EXPIRY_SECS",
                var("UPLOAD_URL_EXPIRY_SECS"),
                DEFAULT_UPLOAD_URL_EXPIRY_SECS,
            )?,
            allowed_content_types: var("VIDEO_ALLOWED_CONTENT_TYPES")
                .unwrap_or_else(|| VIDEO_ALLOWED_CONTENT_TYPES.to_string())
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            list_check_packaged: parse_or(
                "LIST_CHECK_PACKAGED",
                var("LIST_CHECK_PACKAGED").map(|s| s.to_lowercase()),
                false,
            )?,
        };

        let packaging = PackagingSettings {
            ffmpeg_path: var("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe_path: var("FFPROBE_PATH").unwrap_or_else(|| "ffprobe".to_string()),
            hls_segment_duration: parse_or(
                "HLS_SEGMENT_DURATION",
                var("HLS_SEGMENT_DURATION"),
                HLS_SEGMENT_DURATION,
            )?,
            poster_offset_secs: parse_or(
                "POSTER_OFFSET_SECS",
                var("POSTER_OFFSET_SECS"),
                POSTER_OFFSET_SECS,
            )?,
            transcode_timeout_secs: var("TRANSCODE_TIMEOUT_SECS")
                .map(|v| parse_value("TRANSCODE_TIMEOUT_SECS", v))
                .transpose()?,
            work_dir: var("PACKAGING_WORK_DIR").map(PathBuf::from),
        };

        let stream = StreamSettings {
            account_id: var("STREAM_ACCOUNT_ID"),
            api_token: var("STREAM_API_TOKEN"),
            api_base: var("STREAM_API_BASE")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|| STREAM_API_BASE.to_string()),
            delivery_base: var("STREAM_DELIVERY_BASE").map(|s| s.trim_end_matches('/').to_string()),
            max_duration_secs: parse_or(
                "STREAM_MAX_DURATION_SECS",
                var("STREAM_MAX_DURATION_SECS"),
                STREAM_MAX_DURATION_SECS,
            )?,
        };

        if packaging.hls_segment_duration == 0 {
            return Err(ConfigError::Invalid {
                name: "HLS_SEGMENT_DURATION",
                value: "0".to_string(),
            });
        }

        Ok(Config {
            provider,
            storage,
            packaging,
            stream,
        })
    }
}

impl StorageSettings {
    pub fn bucket(&self) -> Result<&str, ConfigError> {
        self.bucket.as_deref().ok_or(ConfigError::Missing("S3_BUCKET"))
    }

    pub fn region(&self) -> Result<&str, ConfigError> {
        self.region.as_deref().ok_or(ConfigError::Missing("S3_REGION"))
    }

    pub fn access_key_id(&self) -> Result<&str, ConfigError> {
        self.access_key_id
            .as_deref()
            .ok_or(ConfigError::Missing("S3_ACCESS_KEY_ID"))
    }

    pub fn secret_access_key(&self) -> Result<&str, ConfigError> {
        self.secret_access_key
            .as_deref()
            .ok_or(ConfigError::Missing("S3_SECRET_ACCESS_KEY"))
    }

    pub fn public_base_url(&self) -> Result<&str, ConfigError> {
        self.public_base_url
            .as_deref()
            .ok_or(ConfigError::Missing("PUBLIC_BASE_URL"))
    }

    /// Reject an upload inbox that overlaps the packaging output prefixes, and a video
    /// ID tag that is not a plain `[A-Za-z0-9_]` word.
    pub fn validate_layout(&self) -> Result<(), ConfigError> {
        let tag = &self.video_id_tag;
        if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::Invalid {
                name: "VIDEO_ID_TAG",
                value: tag.clone(),
            });
        }
        for (reserved, name) in [
            (&self.hls_prefix, "HLS_PREFIX"),
            (&self.poster_prefix, "POSTER_PREFIX"),
        ] {
            if reserved.is_empty() {
                return Err(ConfigError::Invalid {
                    name,
                    value: String::new(),
                });
            }
            if prefix_overlaps(&self.upload_prefix, reserved) {
                return Err(ConfigError::Invalid {
                    name: "UPLOAD_PREFIX",
                    value: self.upload_prefix.clone(),
                });
            }
        }
        Ok(())
    }
}

impl StreamSettings {
    pub fn account_id(&self) -> Result<&str, ConfigError> {
        self.account_id
            .as_deref()
            .ok_or(ConfigError::Missing("STREAM_ACCOUNT_ID"))
    }

    pub fn api_token(&self) -> Result<&str, ConfigError> {
        self.api_token
            .as_deref()
            .ok_or(ConfigError::Missing("STREAM_API_TOKEN"))
    }

    pub fn delivery_base(&self) -> Result<&str, ConfigError> {
        self.delivery_base
            .as_deref()
            .ok_or(ConfigError::Missing("STREAM_DELIVERY_BASE"))
    }
}

impl Debug for StorageSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("StorageSettings")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key_id", &redacted(&self.access_key_id))
            .field("secret_access_key", &redacted(&self.secret_access_key))
            .field("bucket", &self.bucket)
            .field("public_base_url", &self.public_base_url)
            .field("source_prefix", &self.source_prefix)
            .field("upload_prefix", &self.upload_prefix)
            .field("hls_prefix", &self.hls_prefix)
            .field("poster_prefix", &self.poster_prefix)
            .field("video_id_tag", &self.video_id_tag)
            .field("upload_url_expiry_secs", &self.upload_url_expiry_secs)
            .field("allowed_content_types", &self.allowed_content_types)
            .field("list_check_packaged", &self.list_check_packaged)
            .finish()
    }
}

impl Debug for StreamSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("StreamSettings")
            .field("account_id", &self.account_id)
            .field("api_token", &redacted(&self.api_token))
            .field("api_base", &self.api_base)
            .field("delivery_base", &self.delivery_base)
            .field("max_duration_secs", &self.max_duration_secs)
            .finish()
    }
}

fn redacted(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "<redacted>")
}

/// Strip surrounding slashes and collapse empty segments: `/videos//raw/` -> `videos/raw`.
pub fn normalize_prefix(prefix: &str) -> String {
    prefix
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn prefix_overlaps(a: &str, b: &str) -> bool {
    a == b || a.starts_with(&format!("{}/", b)) || b.starts_with(&format!("{}/", a))
}

fn parse_value<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn parse_or<T: FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => parse_value(name, value),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.provider, ProviderKind::ObjectStorage);
        assert_eq!(config.storage.source_prefix, "videos");
        assert_eq!(config.storage.upload_prefix, "videos/inbox");
        assert_eq!(config.storage.hls_prefix, "hls");
        assert_eq!(config.storage.poster_prefix, "poster");
        assert_eq!(config.storage.upload_url_expiry_secs, 600);
        assert_eq!(config.packaging.hls_segment_duration, 6);
        assert_eq!(config.packaging.transcode_timeout_secs, None);
        assert!(!config.storage.list_check_packaged);
    }

    #[test]
    fn test_required_values_fail_at_first_use() {
        let config = config_from(&[]).unwrap();
        assert_eq!(
            config.storage.bucket().unwrap_err(),
            ConfigError::Missing("S3_BUCKET")
        );
        assert_eq!(
            config.storage.public_base_url().unwrap_err(),
            ConfigError::Missing("PUBLIC_BASE_URL")
        );
        assert_eq!(
            config.stream.api_token().unwrap_err(),
            ConfigError::Missing("STREAM_API_TOKEN")
        );
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let config = config_from(&[("S3_BUCKET", "  ")]).unwrap();
        assert!(config.storage.bucket().is_err());
    }

    #[test]
    fn test_region_falls_back_to_aws_region() {
        let config = config_from(&[("AWS_REGION", "eu-central-003")]).unwrap();
        assert_eq!(config.storage.region().unwrap(), "eu-central-003");
    }

    #[test]
    fn test_malformed_number_is_rejected() {
        let err = config_from(&[("UPLOAD_URL_EXPIRY_SECS", "ten minutes")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "UPLOAD_URL_EXPIRY_SECS",
                ..
            }
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = config_from(&[
            ("S3_ACCESS_KEY_ID", "AKIAEXAMPLE"),
            ("S3_SECRET_ACCESS_KEY", "super-secret"),
            ("STREAM_API_TOKEN", "token-value"),
        ])
        .unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("AKIAEXAMPLE"));
        assert!(!rendered.contains("token-value"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("/videos//raw/"), "videos/raw");
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("hls"), "hls");
    }

    #[test]
    fn test_layout_rejects_inbox_under_hls() {
        let config = config_from(&[("UPLOAD_PREFIX", "hls/incoming")]).unwrap();
        assert!(config.storage.validate_layout().is_err());

        let config = config_from(&[("UPLOAD_PREFIX", "poster")]).unwrap();
        assert!(config.storage.validate_layout().is_err());

        let config = config_from(&[("UPLOAD_PREFIX", "hlsx/incoming")]).unwrap();
        assert!(config.storage.validate_layout().is_ok());
    }

    #[test]
    fn test_layout_rejects_unsafe_video_id_tag() {
        for tag in ["b2/x", "../b2", "b 2", "b2-x", "b2.x", "é"] {
            let config = config_from(&[("VIDEO_ID_TAG", tag)]).unwrap();
            match config.storage.validate_layout() {
                Err(ConfigError::Invalid { name, value }) => {
                    assert_eq!(name, "VIDEO_ID_TAG");
                    assert_eq!(value, tag);
                }
                other => panic!("expected VIDEO_ID_TAG rejection for {:?}, got {:?}", tag, other),
            }
        }

        let config = config_from(&[("VIDEO_ID_TAG", "R2_eu")]).unwrap();
        assert!(config.storage.validate_layout().is_ok());
    }

    #[test]
    fn test_managed_stream_selection() {
        let config = config_from(&[
            ("VIDEO_PROVIDER", "stream"),
            ("STREAM_DELIVERY_BASE", "https://customer-abc.cloudflarestream.com/"),
        ])
        .unwrap();
        assert_eq!(config.provider, ProviderKind::ManagedStream);
        assert_eq!(
            config.stream.delivery_base().unwrap(),
            "https://customer-abc.cloudflarestream.com"
        );
    }
}
