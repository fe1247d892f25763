//! Shared test harness: a temp media root behind the full router.

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use galleria::config::Config;
use galleria::server::{create_router, AppContext};
use http_body_util::BodyExt;
use std::io::Cursor;
use tower::ServiceExt;

pub struct TestHarness {
    // Held for its Drop; removes the media root and thumbnail dir.
    _dir: tempfile::TempDir,
    pub ctx: AppContext,
}

impl TestHarness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("media");
        std::fs::create_dir(&root).unwrap();

        let mut config = Config::default();
        config.media.root = root;
        config.media.thumbnail_dir = dir.path().join("thumbnails");

        let ctx = AppContext::from_config(config).unwrap();
        Self { _dir: dir, ctx }
    }

    pub fn router(&self) -> Router {
        create_router(self.ctx.clone(), None)
    }

    /// Write a fixture file into the media root.
    pub fn write_media(&self, name: &str, bytes: &[u8]) {
        std::fs::write(self.ctx.locator.root().join(name), bytes).unwrap();
    }

    /// Number of files currently in the thumbnail cache directory.
    pub fn thumbnail_count(&self) -> usize {
        std::fs::read_dir(self.ctx.thumbnails.dir()).unwrap().count()
    }
}

/// One-shot GET against the router.
pub async fn get(router: Router, uri: &str) -> Response<Body> {
    router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// One-shot GET with a Range header.
pub async fn get_range(router: Router, uri: &str, range: &str) -> Response<Body> {
    router
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("range", range)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Collect a response body to bytes.
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// A small solid-color PNG for thumbnail fixtures.
pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let mut img = image::RgbImage::new(width, height);
    for pixel in img.pixels_mut() {
        *pixel = image::Rgb([40, 180, 90]);
    }
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}
