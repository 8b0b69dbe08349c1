//! Clipvault Processing Library
//!
//! The packaging pipeline: download a source object, extract a poster frame, transcode
//! a fixed two-rung HLS ladder with an external transcoder, and publish every artifact
//! under the deterministic keys derived by the storage facade.

pub mod error;
pub mod pipeline;
pub mod video;
pub mod workspace;

pub use error::{PackagingError, TranscodeError};
pub use pipeline::{PackagingPipeline, PipelineSettings};
pub use video::{FFmpegTranscoder, Rendition, Transcoder, FIXED_LADDER};
pub use workspace::JobWorkspace;
