use serde::{Deserialize, Serialize};

/// Request for a one-time direct upload credential
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateUploadUrlRequest {
    /// Original filename as chosen by the uploader
    pub filename: String,
    /// Content type the client will send with its PUT
    pub content_type: String,
}

/// A time-boxed write grant for a single object.
///
/// The caller issues a raw binary PUT to `url` with the matching `Content-Type` header.
/// Nothing is persisted; the grant lapses after `expires_in` seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateUploadUrlResult {
    pub url: String,
    pub key: String,
    pub bucket: String,
    pub expires_in: u64,
}
