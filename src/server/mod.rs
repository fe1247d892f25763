//! HTTP server assembly: shared context, router, startup and shutdown.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::images::ThumbnailCache;
use crate::library::{AssetLocator, ListingCache};
use crate::streaming::SessionRegistry;

pub mod routes_files;
pub mod routes_media;
pub mod routes_thumbs;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub locator: Arc<AssetLocator>,
    pub thumbnails: Arc<ThumbnailCache>,
    pub listings: Arc<ListingCache>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppContext {
    /// Build the context from configuration, creating the thumbnail
    /// directory and validating the media root.
    pub fn from_config(config: Config) -> Result<Self> {
        let locator = AssetLocator::new(&config.media.root)
            .with_context(|| format!("Media root not accessible: {:?}", config.media.root))?;

        let thumbnails = ThumbnailCache::new(&config.media.thumbnail_dir, &config.tools.ffmpeg)
            .with_context(|| {
                format!(
                    "Failed to create thumbnail directory: {:?}",
                    config.media.thumbnail_dir
                )
            })?;

        let listings = ListingCache::new(Duration::from_secs(config.media.listing_ttl_secs));

        Ok(Self {
            config: Arc::new(config),
            locator: Arc::new(locator),
            thumbnails: Arc::new(thumbnails),
            listings: Arc::new(listings),
            sessions: Arc::new(SessionRegistry::new()),
        })
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE, header::RANGE]);

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/api/sessions", get(list_sessions))
        .merge(routes_thumbs::thumbnail_routes())
        .merge(routes_media::media_routes())
        .merge(routes_files::files_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Serve the client UI (and the video placeholder) if configured.
    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(ServeFile::new(index_path)),
            );
        }
    }

    app
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Snapshot of active transcode sessions.
async fn list_sessions(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.sessions.active())
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let static_dir = config.server.static_dir.clone();

    let ctx = AppContext::from_config(config)?;
    let app = create_router(ctx, static_dir);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
