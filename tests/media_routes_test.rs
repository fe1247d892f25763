//! Integration tests for the media delivery route: range serving,
//! quality dispatch, and input rejection.

mod common;

use common::{body_bytes, get, get_range, sample_png, TestHarness};

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn full_file_request_serves_everything() {
    let h = TestHarness::new();
    h.write_media("clip.mp4", &patterned(2048));

    let resp = get(h.router(), "/media/clip.mp4").await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "video/mp4");
    assert_eq!(resp.headers()["accept-ranges"], "bytes");
    assert_eq!(resp.headers()["content-length"], "2048");

    let body = body_bytes(resp).await;
    assert_eq!(body, patterned(2048));
}

#[tokio::test]
async fn open_range_serves_to_eof_for_small_files() {
    let h = TestHarness::new();
    h.write_media("clip.mp4", &patterned(2048));

    let resp = get_range(h.router(), "/media/clip.mp4", "bytes=0-").await;
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()["content-range"], "bytes 0-2047/2048");
    assert_eq!(resp.headers()["content-length"], "2048");
    assert_eq!(body_bytes(resp).await.len(), 2048);
}

#[tokio::test]
async fn explicit_range_serves_exact_span() {
    let h = TestHarness::new();
    let data = patterned(2048);
    h.write_media("clip.mp4", &data);

    let resp = get_range(h.router(), "/media/clip.mp4", "bytes=100-199").await;
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()["content-length"], "100");
    assert_eq!(resp.headers()["content-range"], "bytes 100-199/2048");

    let body = body_bytes(resp).await;
    assert_eq!(body, &data[100..200]);
}

#[tokio::test]
async fn range_from_offset_serves_tail() {
    let h = TestHarness::new();
    let data = patterned(4096);
    h.write_media("clip.mov", &data);

    let resp = get_range(h.router(), "/media/clip.mov", "bytes=4000-").await;
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()["content-type"], "video/quicktime");
    assert_eq!(resp.headers()["content-range"], "bytes 4000-4095/4096");
    assert_eq!(body_bytes(resp).await, &data[4000..]);
}

#[tokio::test]
async fn malformed_range_is_rejected() {
    let h = TestHarness::new();
    h.write_media("clip.mp4", &patterned(2048));

    for range in ["bytes=abc-def", "bytes=-", "chunks=0-10", "bytes=-500"] {
        let resp = get_range(h.router(), "/media/clip.mp4", range).await;
        assert_eq!(resp.status(), 400, "accepted {:?}", range);
    }
}

#[tokio::test]
async fn unsatisfiable_range_is_rejected() {
    let h = TestHarness::new();
    h.write_media("clip.mp4", &patterned(1000));

    // start past EOF, inverted span, end past EOF
    for range in ["bytes=1000-", "bytes=200-100", "bytes=0-1000"] {
        let resp = get_range(h.router(), "/media/clip.mp4", range).await;
        assert_eq!(resp.status(), 400, "accepted {:?}", range);
    }
}

#[tokio::test]
async fn missing_file_is_404() {
    let h = TestHarness::new();
    let resp = get(h.router(), "/media/absent.mp4").await;
    assert_eq!(resp.status(), 404);
    assert_eq!(body_bytes(resp).await, b"File not found");
}

#[tokio::test]
async fn traversal_is_404() {
    let h = TestHarness::new();
    // A real file one level above the media root.
    std::fs::write(
        h.ctx.locator.root().parent().unwrap().join("secret.txt"),
        b"secret",
    )
    .unwrap();

    let resp = get(h.router(), "/media/..%2Fsecret.txt").await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn unsupported_extension_is_400() {
    let h = TestHarness::new();
    h.write_media("archive.zip", b"PK");

    let resp = get(h.router(), "/media/archive.zip").await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn unknown_quality_is_400_and_spawns_nothing() {
    let h = TestHarness::new();
    h.write_media("clip.mp4", &patterned(2048));

    let resp = get(h.router(), "/media/clip.mp4?quality=480p").await;
    assert_eq!(resp.status(), 400);
    assert!(h.ctx.sessions.is_empty());
}

#[tokio::test]
async fn quality_4k_uses_direct_serving() {
    let h = TestHarness::new();
    h.write_media("clip.webm", &patterned(512));

    let resp = get(h.router(), "/media/clip.webm?quality=4k").await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "video/webm");
    assert!(h.ctx.sessions.is_empty());
}

#[tokio::test]
async fn images_are_served_with_their_content_type() {
    let h = TestHarness::new();
    let png = sample_png(8, 8);
    h.write_media("photo.png", &png);

    let resp = get(h.router(), "/media/photo.png").await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "image/png");
    assert_eq!(body_bytes(resp).await, png);
}

#[tokio::test]
async fn quality_is_ignored_for_images() {
    let h = TestHarness::new();
    h.write_media("photo.jpg", &sample_png(8, 8));

    let resp = get(h.router(), "/media/photo.jpg?quality=720p").await;
    assert_eq!(resp.status(), 200);
    assert!(h.ctx.sessions.is_empty());
}

#[tokio::test]
async fn images_support_range_requests() {
    let h = TestHarness::new();
    let png = sample_png(64, 64);
    h.write_media("photo.png", &png);

    let resp = get_range(h.router(), "/media/photo.png", "bytes=0-9").await;
    assert_eq!(resp.status(), 206);
    assert_eq!(body_bytes(resp).await, &png[..10]);
}

#[tokio::test]
async fn health_endpoint_responds() {
    let h = TestHarness::new();
    let resp = get(h.router(), "/health").await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn sessions_endpoint_is_empty_initially() {
    let h = TestHarness::new();
    let resp = get(h.router(), "/api/sessions").await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body, serde_json::json!([]));
}
