//! Clipvault Storage Library
//!
//! Object-store client facade: authenticated list/head/get/put against an
//! S3-compatible endpoint, presigned upload URLs, and deterministic ID and path
//! derivation. This crate is the only holder of store credentials.
//!
//! # Key layout
//!
//! - Source objects: `{source_prefix}/...` (direct uploads land in `{upload_prefix}/{millis}-{filename}`)
//! - Packaged manifest: `{hls_prefix}/{video_id}/master.m3u8`
//! - Poster: `{poster_prefix}/{video_id}.jpg`
//!
//! `video_id` is `{tag}_{first 32 hex chars of sha256(key)}`, computed from the source key
//! alone. Key generation is centralized in the `keys` module.

pub mod client;
pub mod factory;
pub mod health;
pub mod keys;
#[cfg(any(test, feature = "storage-memory"))]
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use client::{StoreClient, StoreLayout};
pub use factory::{create_object_store, create_store_client};
pub use health::{check_connection, ConnectionHealth};
#[cfg(any(test, feature = "storage-memory"))]
pub use memory::InMemoryObjectStore;
#[cfg(feature = "storage-s3")]
pub use s3::S3ObjectStore;
pub use traits::{ListPage, ObjectHead, ObjectStore, StorageError, StorageResult};
