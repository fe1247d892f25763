//! Still-image handling: HEIC normalization and the thumbnail cache.

pub mod normalize;
pub mod thumbs;

pub use thumbs::{Thumbnail, ThumbnailCache};
