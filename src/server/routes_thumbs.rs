//! Thumbnail route.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};

use super::AppContext;
use crate::error::MediaError;
use crate::images::Thumbnail;

pub fn thumbnail_routes() -> Router<AppContext> {
    Router::new().route("/thumbnail/:filename", get(serve_thumbnail))
}

async fn serve_thumbnail(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
) -> Result<Response, MediaError> {
    let asset = ctx.locator.resolve(&filename)?;

    match ctx.thumbnails.get(&asset).await? {
        Thumbnail::Jpeg(bytes) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "image/jpeg")
            .header(header::CONTENT_LENGTH, bytes.len().to_string())
            .header(header::CACHE_CONTROL, "public, max-age=3600")
            .body(Body::from(bytes))
            .map_err(|e| MediaError::Io(std::io::Error::other(e))),
        Thumbnail::Placeholder(path) => Ok(Redirect::temporary(path).into_response()),
    }
}
