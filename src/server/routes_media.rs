//! Media delivery route.
//!
//! Top-level dispatch for `GET /media/{filename}`: range-serving for
//! originals, the transcoding pipeline for reduced-quality video, and
//! one-shot HEIC normalization for proprietary stills.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;

use super::AppContext;
use crate::error::MediaError;
use crate::images::normalize;
use crate::library::{asset::content_type, MediaKind};
use crate::streaming::{range, transcode, QualityTier};

/// Quality factor for HEIC assets served whole through this route.
const FULL_HEIC_QUALITY: f32 = 0.9;

pub fn media_routes() -> Router<AppContext> {
    Router::new().route("/media/:filename", get(serve_media))
}

#[derive(Debug, Deserialize)]
struct MediaQuery {
    /// auto (default), 4k, 720p or 1080p.
    #[serde(default = "default_quality")]
    quality: String,
}

fn default_quality() -> String {
    "auto".to_string()
}

async fn serve_media(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
    Query(query): Query<MediaQuery>,
    headers: HeaderMap,
) -> Result<Response, MediaError> {
    let asset = ctx.locator.resolve(&filename)?;

    let range_header = headers
        .get(header::RANGE)
        .and_then(|h| h.to_str().ok());

    match asset.kind {
        MediaKind::Unsupported => Err(MediaError::UnsupportedType(asset.extension)),

        MediaKind::Video => match query.quality.as_str() {
            // Original quality: range-aware direct serving.
            "auto" | "4k" => {
                range::serve_file(&asset.path, range_header, content_type(&asset.extension)).await
            }
            other => {
                let tier = QualityTier::parse(other)
                    .ok_or_else(|| MediaError::InvalidQuality(other.to_string()))?;
                transcode::stream_transcoded(
                    &ctx.config.tools.ffmpeg,
                    &asset.path,
                    &asset.name,
                    tier,
                    ctx.sessions.clone(),
                )
                .await
            }
        },

        // HEIC is decoded on the fly and served whole; range semantics do
        // not apply to a freshly generated buffer.
        MediaKind::HeicImage => {
            let source = tokio::fs::read(&asset.path).await?;
            let jpeg =
                normalize::normalize(&ctx.config.tools.ffmpeg, &source, FULL_HEIC_QUALITY).await?;

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "image/jpeg")
                .header(header::CONTENT_LENGTH, jpeg.len().to_string())
                .body(Body::from(jpeg))
                .map_err(|e| MediaError::Io(std::io::Error::other(e)))
        }

        MediaKind::StillImage => {
            range::serve_file(&asset.path, range_header, content_type(&asset.extension)).await
        }
    }
}
