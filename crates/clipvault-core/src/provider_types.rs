use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::ConfigError;

/// Video provider back-ends
///
/// Exactly one is active per process; it is chosen from `VIDEO_PROVIDER` at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Source files live directly in an S3-compatible bucket; HLS is packaged on demand.
    #[default]
    ObjectStorage,
    /// A third-party streaming API owns ingestion, transcoding and playback URLs.
    ManagedStream,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "object-storage" | "object_storage" | "s3" | "b2" => Ok(ProviderKind::ObjectStorage),
            "managed-stream" | "managed_stream" | "stream" | "cloudflare" => {
                Ok(ProviderKind::ManagedStream)
            }
            _ => Err(ConfigError::Invalid {
                name: "VIDEO_PROVIDER",
                value: s.to_string(),
            }),
        }
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ProviderKind::ObjectStorage => write!(f, "object-storage"),
            ProviderKind::ManagedStream => write!(f, "managed-stream"),
        }
    }
}
