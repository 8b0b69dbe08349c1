//! Provider-neutral data model.

pub mod packaging;
pub mod upload;
pub mod video;

pub use packaging::PackagingResult;
pub use upload::{CreateUploadUrlRequest, CreateUploadUrlResult};
pub use video::{sort_newest_first, SourceObject, VideoFormat, VideoResource};
