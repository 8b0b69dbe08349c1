use serde::{Deserialize, Serialize};

/// Outcome of one packaging invocation. Not persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PackagingResult {
    pub video_id: String,
    pub source_key: String,
    pub manifest_key: String,
    pub poster_key: String,
    /// Segments + variant manifests + master manifest + poster
    pub uploaded_count: usize,
}
