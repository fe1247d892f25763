//! Disk-backed thumbnail cache.
//!
//! Thumbnails are generated on first request, persisted under a sanitized
//! filename, and served unchanged afterwards. There is no staleness check
//! against the source file: once written, an entry is immutable until
//! housekeeping outside this process removes it.
//!
//! The filename sanitization is one-way and collision-tolerant: two
//! distinct source names can map to the same cache key. Acceptable for a
//! single-operator library, but not collision-free.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::MediaError;
use crate::images::normalize;
use crate::library::{MediaAsset, MediaKind};

/// Square thumbnail edge length in pixels.
const THUMB_DIM: u32 = 300;
/// JPEG encode quality for generated thumbnails.
const THUMB_JPEG_QUALITY: u8 = 80;
/// Quality factor for HEIC normalization feeding the thumbnailer.
const THUMB_HEIC_QUALITY: f32 = 0.8;

/// Static asset used as the preview for video files.
pub const VIDEO_PLACEHOLDER: &str = "/video-placeholder.svg";

/// Result of a thumbnail request.
#[derive(Debug, Clone)]
pub enum Thumbnail {
    /// JPEG bytes, cached or freshly generated.
    Jpeg(Bytes),
    /// Videos get a fixed placeholder; the cache is not touched.
    Placeholder(&'static str),
}

type Waiters = Vec<oneshot::Sender<Result<Bytes, MediaError>>>;

/// Generates and serves cached preview images.
pub struct ThumbnailCache {
    dir: PathBuf,
    ffmpeg: PathBuf,
    /// In-flight generations by cache key. Requests subscribe here and a
    /// detached worker answers every subscriber, so an entry outlives any
    /// individual request.
    inflight: Arc<Mutex<HashMap<String, Waiters>>>,
}

impl ThumbnailCache {
    /// Create the cache, ensuring its directory exists.
    pub fn new(dir: impl Into<PathBuf>, ffmpeg: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            ffmpeg: ffmpeg.into(),
            inflight: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// On-disk path for a source filename's thumbnail.
    pub fn cache_path(&self, filename: &str) -> PathBuf {
        self.dir.join(cache_key(filename))
    }

    /// Return the thumbnail for an asset, generating it on a cache miss.
    pub async fn get(&self, asset: &MediaAsset) -> Result<Thumbnail, MediaError> {
        match asset.kind {
            MediaKind::Video => return Ok(Thumbnail::Placeholder(VIDEO_PLACEHOLDER)),
            MediaKind::Unsupported => {
                return Err(MediaError::UnsupportedType(asset.extension.clone()))
            }
            MediaKind::StillImage | MediaKind::HeicImage => {}
        }

        let key = cache_key(&asset.name);
        let path = self.dir.join(&key);

        // Cache hit: serve the stored bytes unconditionally.
        if let Ok(bytes) = tokio::fs::read(&path).await {
            tracing::debug!(key, "Thumbnail cache hit");
            return Ok(Thumbnail::Jpeg(Bytes::from(bytes)));
        }

        // Coalesce concurrent misses for the same key.
        match self.subscribe(&key, asset, &path).await {
            Ok(Ok(bytes)) => Ok(Thumbnail::Jpeg(bytes)),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(MediaError::Decode("thumbnail generation aborted".into())),
        }
    }

    /// Subscribe to the generation for `key`, spawning the worker if this
    /// request is the first. The worker runs detached from the request: a
    /// caller dropped mid-generation cannot strand the in-flight entry,
    /// and later subscribers are always answered.
    fn subscribe(
        &self,
        key: &str,
        asset: &MediaAsset,
        cache_path: &Path,
    ) -> oneshot::Receiver<Result<Bytes, MediaError>> {
        let (tx, rx) = oneshot::channel();

        let mut map = self.inflight.lock();
        if let Some(waiters) = map.get_mut(key) {
            tracing::debug!(key, "Waiting on in-flight thumbnail generation");
            waiters.push(tx);
            return rx;
        }
        map.insert(key.to_string(), vec![tx]);
        drop(map);

        let inflight = Arc::clone(&self.inflight);
        let ffmpeg = self.ffmpeg.clone();
        let asset = asset.clone();
        let cache_path = cache_path.to_path_buf();
        let key = key.to_string();
        tokio::spawn(async move {
            let result = generate(&ffmpeg, &asset, &cache_path).await;
            let waiters = inflight.lock().remove(&key).unwrap_or_default();
            for tx in waiters {
                let _ = tx.send(result.clone());
            }
        });

        rx
    }
}

/// Generate, persist, and return a thumbnail for a still image.
async fn generate(
    ffmpeg: &Path,
    asset: &MediaAsset,
    cache_path: &Path,
) -> Result<Bytes, MediaError> {
    let source = tokio::fs::read(&asset.path).await?;

    let raster = match asset.kind {
        MediaKind::HeicImage => normalize::normalize(ffmpeg, &source, THUMB_HEIC_QUALITY).await?,
        _ => source,
    };

    // Decode/resize/encode is CPU-bound; keep it off the reactor.
    let thumb = tokio::task::spawn_blocking(move || render_thumbnail(&raster))
        .await
        .map_err(|e| MediaError::Decode(format!("thumbnail worker failed: {}", e)))??;
    let thumb = Bytes::from(thumb);

    // A failed persist must not withhold the computed bytes from the
    // current caller.
    if let Err(e) = tokio::fs::write(cache_path, &thumb).await {
        tracing::warn!(
            path = %cache_path.display(),
            error = %e,
            "Failed to persist thumbnail"
        );
    } else {
        tracing::debug!(path = %cache_path.display(), "Thumbnail cached");
    }

    Ok(thumb)
}

/// Sanitized cache key for a source filename: every character outside
/// `[A-Za-z0-9.-]` becomes `_`, with a `.jpg` suffix appended.
pub fn cache_key(filename: &str) -> String {
    let mut key: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    key.push_str(".jpg");
    key
}

/// Cover-fit a raster image to the thumbnail square and encode as JPEG.
fn render_thumbnail(data: &[u8]) -> Result<Vec<u8>, MediaError> {
    let img = image::load_from_memory(data)
        .map_err(|e| MediaError::Decode(format!("image decode failed: {}", e)))?;

    // Scale to fill, crop centered.
    let resized = img.resize_to_fill(THUMB_DIM, THUMB_DIM, FilterType::Lanczos3);

    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, THUMB_JPEG_QUALITY);
    resized
        .write_with_encoder(encoder)
        .map_err(|e| MediaError::Decode(format!("jpeg encode failed: {}", e)))?;

    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::AssetLocator;
    use image::ImageFormat;

    fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let mut img = image::RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([0, 128, 255]);
        }
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn harness(filename: &str, payload: &[u8]) -> (tempfile::TempDir, AssetLocator, ThumbnailCache) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("media");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join(filename), payload).unwrap();
        let locator = AssetLocator::new(&root).unwrap();
        let cache = ThumbnailCache::new(dir.path().join("thumbs"), "ffmpeg").unwrap();
        (dir, locator, cache)
    }

    #[test]
    fn test_cache_key_sanitization() {
        assert_eq!(cache_key("photo.jpg"), "photo.jpg.jpg");
        assert_eq!(cache_key("my photo (1).jpg"), "my_photo__1_.jpg.jpg");
        assert_eq!(cache_key("über.png"), "_ber.png.jpg");
        assert_eq!(cache_key("a/b.jpg"), "a_b.jpg.jpg");
    }

    #[test]
    fn test_cache_key_collision_is_known() {
        // Distinct names may share a key; documented limitation.
        assert_eq!(cache_key("a b.jpg"), cache_key("a_b.jpg"));
    }

    #[test]
    fn test_render_thumbnail_is_square() {
        let png = sample_png(640, 480);
        let jpeg = render_thumbnail(&png).unwrap();
        let img = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(img.width(), THUMB_DIM);
        assert_eq!(img.height(), THUMB_DIM);
    }

    #[test]
    fn test_render_thumbnail_rejects_garbage() {
        assert!(matches!(
            render_thumbnail(b"not an image"),
            Err(MediaError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_generation_persists_one_file() {
        let (_dir, locator, cache) = harness("pic.png", &sample_png(64, 64));
        let asset = locator.resolve("pic.png").unwrap();

        let first = match cache.get(&asset).await.unwrap() {
            Thumbnail::Jpeg(b) => b,
            other => panic!("expected jpeg, got {:?}", other),
        };
        let second = match cache.get(&asset).await.unwrap() {
            Thumbnail::Jpeg(b) => b,
            other => panic!("expected jpeg, got {:?}", other),
        };

        // Idempotent: the second request serves the persisted bytes.
        assert_eq!(first, second);

        let files: Vec<_> = std::fs::read_dir(cache.dir()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_video_gets_placeholder_without_cache_writes() {
        let (_dir, locator, cache) = harness("clip.mp4", b"fake video");
        let asset = locator.resolve("clip.mp4").unwrap();

        match cache.get(&asset).await.unwrap() {
            Thumbnail::Placeholder(p) => assert_eq!(p, VIDEO_PLACEHOLDER),
            other => panic!("expected placeholder, got {:?}", other),
        }
        assert_eq!(std::fs::read_dir(cache.dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_kind_rejected() {
        let (_dir, locator, cache) = harness("doc.pdf", b"%PDF");
        let asset = locator.resolve("doc.pdf").unwrap();
        assert!(matches!(
            cache.get(&asset).await,
            Err(MediaError::UnsupportedType(_))
        ));
    }

    /// A fake decoder that stalls, then fails; stands in for ffmpeg when a
    /// test needs a generation that outlives the request.
    fn stalling_decoder(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, "#!/bin/sh\nsleep 1\nexit 1\n").unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[tokio::test]
    async fn test_abandoned_request_does_not_wedge_later_ones() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("media");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("pic.heic"), b"heic payload").unwrap();
        let locator = AssetLocator::new(&root).unwrap();
        let decoder = stalling_decoder(dir.path());
        let cache =
            std::sync::Arc::new(ThumbnailCache::new(dir.path().join("thumbs"), decoder).unwrap());
        let asset = locator.resolve("pic.heic").unwrap();

        // First request goes away while the decoder is still running.
        let first = tokio::spawn({
            let cache = cache.clone();
            let asset = asset.clone();
            async move { cache.get(&asset).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        first.abort();

        // A later request must still get an answer once the worker finishes.
        let second = tokio::time::timeout(std::time::Duration::from_secs(5), cache.get(&asset))
            .await
            .expect("request stuck behind an abandoned generation");
        assert!(matches!(second, Err(MediaError::Decode(_))));
        assert!(cache.inflight.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_its_error_kind_under_concurrency() {
        let (_dir, locator, cache) = harness("pic.png", &sample_png(16, 16));
        let asset = locator.resolve("pic.png").unwrap();
        std::fs::remove_file(&asset.path).unwrap();

        let cache = std::sync::Arc::new(cache);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let asset = asset.clone();
            handles.push(tokio::spawn(async move { cache.get(&asset).await }));
        }
        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, MediaError::Io(_)), "flattened to {:?}", err);
        }
    }

    #[tokio::test]
    async fn test_concurrent_requests_coalesce() {
        let (_dir, locator, cache) = harness("pic.png", &sample_png(256, 256));
        let cache = std::sync::Arc::new(cache);
        let asset = locator.resolve("pic.png").unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let asset = asset.clone();
            handles.push(tokio::spawn(async move { cache.get(&asset).await }));
        }

        let mut outputs = Vec::new();
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                Thumbnail::Jpeg(b) => outputs.push(b),
                other => panic!("expected jpeg, got {:?}", other),
            }
        }
        assert!(outputs.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(std::fs::read_dir(cache.dir()).unwrap().count(), 1);
    }
}
