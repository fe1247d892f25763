//! Paginated media directory listing with a short-lived in-memory cache.
//!
//! Listing a large directory stats every entry, so rendered pages are kept
//! for a configurable TTL (an hour by default) and evicted lazily.

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::MediaError;
use crate::library::asset::{classify, extension_of, MediaKind};

/// One entry of the media listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    /// "image" or "video".
    #[serde(rename = "type")]
    pub media_type: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Pagination metadata accompanying a listing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    #[serde(rename = "totalPages")]
    pub total_pages: usize,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

/// A single page of listing results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingPage {
    pub files: Vec<FileEntry>,
    pub pagination: Pagination,
}

/// Which media types a listing should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFilter {
    All,
    Image,
    Video,
}

impl ListingFilter {
    pub fn parse(s: &str) -> Self {
        match s {
            "image" => ListingFilter::Image,
            "video" => ListingFilter::Video,
            _ => ListingFilter::All,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ListingFilter::All => "all",
            ListingFilter::Image => "image",
            ListingFilter::Video => "video",
        }
    }
}

/// TTL cache of rendered listing pages, keyed by (page, limit, filter).
pub struct ListingCache {
    entries: DashMap<String, (Instant, ListingPage)>,
    ttl: Duration,
}

impl ListingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    fn key(page: usize, limit: usize, filter: ListingFilter) -> String {
        format!("files_{}_{}_{}", page, limit, filter.as_str())
    }

    pub fn get(&self, page: usize, limit: usize, filter: ListingFilter) -> Option<ListingPage> {
        let key = Self::key(page, limit, filter);
        if let Some(entry) = self.entries.get(&key) {
            let (stored_at, page) = entry.value();
            if stored_at.elapsed() < self.ttl {
                return Some(page.clone());
            }
        }
        // Expired entries are dropped on the next lookup.
        self.entries.remove(&key);
        None
    }

    pub fn insert(&self, page: usize, limit: usize, filter: ListingFilter, value: ListingPage) {
        self.entries
            .insert(Self::key(page, limit, filter), (Instant::now(), value));
    }
}

/// List media files under `root`, newest first, paginated.
///
/// Only recognized media extensions are included; subdirectories are
/// skipped.
pub async fn list_files(
    root: &Path,
    page: usize,
    limit: usize,
    filter: ListingFilter,
) -> Result<ListingPage, MediaError> {
    let page = page.max(1);
    let limit = limit.max(1);

    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(root).await?;

    while let Some(entry) = read_dir.next_entry().await? {
        let name = match entry.file_name().into_string() {
            Ok(n) => n,
            Err(_) => continue,
        };

        let kind = classify(&extension_of(&name));
        let media_type = match kind {
            MediaKind::StillImage | MediaKind::HeicImage => "image",
            MediaKind::Video => "video",
            MediaKind::Unsupported => continue,
        };

        let metadata = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };

        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        entries.push(FileEntry {
            name,
            media_type: media_type.to_string(),
            size: metadata.len(),
            modified,
        });
    }

    entries.sort_by(|a, b| b.modified.cmp(&a.modified));

    let entries: Vec<FileEntry> = match filter {
        ListingFilter::All => entries,
        ListingFilter::Image => entries
            .into_iter()
            .filter(|e| e.media_type == "image")
            .collect(),
        ListingFilter::Video => entries
            .into_iter()
            .filter(|e| e.media_type == "video")
            .collect(),
    };

    let total = entries.len();
    let total_pages = total.div_ceil(limit);
    let start = (page - 1).saturating_mul(limit).min(total);
    let end = (start + limit).min(total);

    Ok(ListingPage {
        files: entries[start..end].to_vec(),
        pagination: Pagination {
            page,
            limit,
            total,
            total_pages,
            has_more: page < total_pages,
        },
    })
}
