use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory of static UI assets (served as the router fallback).
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    /// Root directory containing the served media files.
    #[serde(default = "default_media_root")]
    pub root: PathBuf,

    /// Directory for generated thumbnails (created on startup).
    #[serde(default = "default_thumbnail_dir")]
    pub thumbnail_dir: PathBuf,

    /// Seconds a cached `/files` listing page stays fresh.
    #[serde(default = "default_listing_ttl")]
    pub listing_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// ffmpeg binary used for transcoding and HEIC conversion.
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_media_root() -> PathBuf {
    PathBuf::from("./media")
}
fn default_thumbnail_dir() -> PathBuf {
    PathBuf::from("./thumbnails")
}
fn default_listing_ttl() -> u64 {
    3600
}
fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: default_media_root(),
            thumbnail_dir: default_thumbnail_dir(),
            listing_ttl_secs: default_listing_ttl(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: default_ffmpeg(),
        }
    }
}
