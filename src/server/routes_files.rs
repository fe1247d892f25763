//! Paginated media listing route.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::AppContext;
use crate::error::MediaError;
use crate::library::listing::{self, ListingFilter, ListingPage};

pub fn files_routes() -> Router<AppContext> {
    Router::new().route("/files", get(list_files))
}

#[derive(Debug, Deserialize)]
struct FilesQuery {
    #[serde(default = "default_page")]
    page: usize,
    #[serde(default = "default_limit")]
    limit: usize,
    /// all (default), image or video.
    #[serde(default = "default_filter")]
    filter: String,
}

fn default_page() -> usize {
    1
}
fn default_limit() -> usize {
    20
}
fn default_filter() -> String {
    "all".to_string()
}

async fn list_files(
    State(ctx): State<AppContext>,
    Query(query): Query<FilesQuery>,
) -> Result<Json<ListingPage>, MediaError> {
    let filter = ListingFilter::parse(&query.filter);

    if let Some(page) = ctx.listings.get(query.page, query.limit, filter) {
        return Ok(Json(page));
    }

    let page = listing::list_files(&ctx.config.media.root, query.page, query.limit, filter).await?;
    ctx.listings.insert(query.page, query.limit, filter, page.clone());

    Ok(Json(page))
}
