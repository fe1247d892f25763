//! Media delivery engines.
//!
//! - `range`: byte-range serving of original files (200/206 with bounded
//!   buffering, 10 MiB window for open-ended ranges).
//! - `transcode`: progressive ffmpeg transcoding piped into the response,
//!   with per-session process ownership and disconnect-driven cancellation.

pub mod range;
pub mod transcode;

pub use range::serve_file;
pub use transcode::{QualityTier, SessionRegistry, TranscodeState};
