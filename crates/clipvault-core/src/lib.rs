//! Clipvault Core Library
//!
//! This crate provides the provider-neutral data model, configuration, and error
//! types shared by the storage facade, the packaging pipeline, and the video providers.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod provider_types;

// Re-export commonly used types
pub use config::{Config, PackagingSettings, StorageSettings, StreamSettings};
pub use error::{ConfigError, ErrorMetadata, LogLevel};
pub use models::{
    CreateUploadUrlRequest, CreateUploadUrlResult, PackagingResult, SourceObject, VideoFormat,
    VideoResource,
};
pub use provider_types::ProviderKind;
