//! Clipvault Services Library
//!
//! The video provider interface and its two back-ends. Callers depend on
//! `VideoProvider` only; `create_video_provider` picks the implementation once from
//! configuration.

pub mod error;
pub mod managed_stream;
pub mod object_storage;
pub mod provider;
pub mod selector;

pub use error::ProviderError;
pub use managed_stream::ManagedStreamProvider;
pub use object_storage::ObjectStorageProvider;
pub use provider::VideoProvider;
pub use selector::create_video_provider;
