//! Byte-range file serving.
//!
//! Serves original files whole or as a single byte span with correct
//! partial-content headers. Open-ended ranges are clamped to a 10 MiB
//! window so one request never commits the server to streaming an entire
//! large file; clients paginate with follow-up ranges.
//!
//! Parsing is strict by design: only `bytes=<start>-[<end>]` is accepted,
//! and unsatisfiable spans are rejected instead of clamped.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::error::MediaError;

/// Window served for an open-ended range request.
const RANGE_WINDOW: u64 = 10 * 1024 * 1024;
/// Internal read buffer; keeps memory use independent of file size.
const STREAM_BUF: usize = 64 * 1024;

/// An inclusive, validated byte span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes in the span (start <= end is guaranteed by the parser).
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Parse and validate a `Range` header against a file of `file_size` bytes.
///
/// Accepted grammar: `bytes=<start>-` (clamped to the 10 MiB window) and
/// `bytes=<start>-<end>`. Everything else, including the suffix form
/// `bytes=-N`, fails with `InvalidRange`, as do spans with
/// `start >= file_size`, `end < start`, or `end >= file_size`.
pub fn parse_range(header: &str, file_size: u64) -> Result<ByteRange, MediaError> {
    let invalid = || MediaError::InvalidRange(header.to_string());

    let spec = header.strip_prefix("bytes=").ok_or_else(invalid)?;
    let (start, end) = spec.split_once('-').ok_or_else(invalid)?;

    let start: u64 = start.trim().parse().map_err(|_| invalid())?;
    if start >= file_size {
        return Err(invalid());
    }

    let end = match end.trim() {
        "" => (start + RANGE_WINDOW - 1).min(file_size - 1),
        explicit => {
            let end: u64 = explicit.parse().map_err(|_| invalid())?;
            if end < start || end >= file_size {
                return Err(invalid());
            }
            end
        }
    };

    Ok(ByteRange { start, end })
}

/// Serve a file, honoring an optional `Range` header.
///
/// Without a range this responds `200` with the full content length;
/// with one, `206` and the requested span only. Bytes are delivered in
/// file-offset order through a bounded 64 KiB buffer.
pub async fn serve_file(
    path: &Path,
    range_header: Option<&str>,
    content_type: &str,
) -> Result<Response, MediaError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| MediaError::NotFound)?;
    let file_size = metadata.len();

    match range_header {
        Some(header) => {
            let range = parse_range(header, file_size)?;

            let mut file = File::open(path).await.map_err(|_| MediaError::NotFound)?;
            file.seek(SeekFrom::Start(range.start)).await?;

            let stream = ReaderStream::with_capacity(file.take(range.len()), STREAM_BUF);
            let body = Body::from_stream(stream);

            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, range.len().to_string())
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", range.start, range.end, file_size),
                )
                .header(header::ACCEPT_RANGES, "bytes")
                .header(header::CACHE_CONTROL, "public, max-age=3600")
                .body(body)
                .map_err(|e| MediaError::Io(std::io::Error::other(e)))
        }
        None => {
            let file = File::open(path).await.map_err(|_| MediaError::NotFound)?;

            let stream = ReaderStream::with_capacity(file, STREAM_BUF);
            let body = Body::from_stream(stream);

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CONTENT_LENGTH, file_size.to_string())
                .header(header::ACCEPT_RANGES, "bytes")
                .header(header::CACHE_CONTROL, "public, max-age=3600")
                .body(body)
                .map_err(|e| MediaError::Io(std::io::Error::other(e)))
        }
    }
}
