//! Asset resolution and classification.
//!
//! Maps an untrusted logical filename onto a real file inside the media
//! root, refusing anything that resolves outside it, and classifies the
//! asset by extension.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::MediaError;

/// What kind of media an extension denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Directly servable raster image (jpg, jpeg, png, gif).
    StillImage,
    /// HEIC still image, needs normalization before serving.
    HeicImage,
    /// Video container (mp4, mov, webm).
    Video,
    /// Anything else; rejected before decode or transcode.
    Unsupported,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaKind::StillImage => "image",
            MediaKind::HeicImage => "heic",
            MediaKind::Video => "video",
            MediaKind::Unsupported => "unsupported",
        };
        write!(f, "{}", s)
    }
}

/// A resolved media asset, constructed per request and immutable.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    /// The logical filename as requested by the client.
    pub name: String,
    /// Canonicalized path, guaranteed to lie inside the media root.
    pub path: PathBuf,
    /// Lowercased extension without the dot.
    pub extension: String,
    pub kind: MediaKind,
}

/// Resolves logical filenames against a configured media root.
#[derive(Debug, Clone)]
pub struct AssetLocator {
    root: PathBuf,
}

impl AssetLocator {
    /// Create a locator for the given media root.
    ///
    /// The root itself is canonicalized once so containment checks compare
    /// like with like.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, MediaError> {
        let root = root.into().canonicalize()?;
        Ok(Self { root })
    }

    /// The canonicalized media root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a logical filename to an asset.
    ///
    /// Fails with `NotFound` when the file does not exist or when the
    /// canonicalized path escapes the media root (traversal attempt).
    pub fn resolve(&self, filename: &str) -> Result<MediaAsset, MediaError> {
        let joined = self.root.join(filename);

        // Canonicalization fails for nonexistent paths, which is exactly
        // the NotFound case.
        let path = joined.canonicalize().map_err(|_| MediaError::NotFound)?;

        if !path.starts_with(&self.root) {
            tracing::warn!(filename, "Rejected path escaping media root");
            return Err(MediaError::NotFound);
        }

        if !path.is_file() {
            return Err(MediaError::NotFound);
        }

        let extension = extension_of(filename);
        let kind = classify(&extension);

        Ok(MediaAsset {
            name: filename.to_string(),
            path,
            extension,
            kind,
        })
    }
}

/// Lowercased extension of a filename, without the leading dot.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Classify an extension into a media kind. Pure lookup.
pub fn classify(extension: &str) -> MediaKind {
    match extension {
        "jpg" | "jpeg" | "png" | "gif" => MediaKind::StillImage,
        "heic" => MediaKind::HeicImage,
        "mp4" | "mov" | "webm" => MediaKind::Video,
        _ => MediaKind::Unsupported,
    }
}

/// Content type for a media extension.
pub fn content_type(extension: &str) -> &'static str {
    match extension {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
