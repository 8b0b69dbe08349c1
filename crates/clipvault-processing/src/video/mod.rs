//! Video transcoding module

pub mod ladder;
pub mod service;
pub mod transcoder;

pub use ladder::{master_playlist, Rendition, FIXED_LADDER};
pub use service::FFmpegTranscoder;
pub use transcoder::Transcoder;
