//! On-the-fly video transcoding.
//!
//! Spawns ffmpeg per request and pipes its stdout straight into the HTTP
//! response as a fragmented MP4 (no trailing index, playable as it
//! arrives). Encoder settings favor time-to-first-byte over compression:
//! veryfast preset, baseline profile, short fixed GOP with scene-cut
//! detection disabled.
//!
//! Each session owns exactly one child process. The pump task is the only
//! place that terminates it: on client disconnect before the first output
//! byte a short grace period applies, after streaming has started the
//! encoder is killed immediately.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::error::MediaError;

/// Grace period before killing the encoder when the client disconnects
/// prior to the first output byte.
pub const DISCONNECT_GRACE: Duration = Duration::from_secs(1);
/// Encoder output is read in chunks of this size.
const CHUNK_SIZE: usize = 64 * 1024;
/// Bounded channel depth between the pump and the response body; a slow
/// client backpressures the encoder through a full pipe.
const CHANNEL_DEPTH: usize = 4;

/// Fixed encoding profiles; requests for anything else are rejected
/// before a process is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QualityTier {
    /// 1280x720 @ 2500 kbps.
    #[serde(rename = "720p")]
    Q720p,
    /// 1920x1080 @ 5000 kbps.
    #[serde(rename = "1080p")]
    Q1080p,
}

impl QualityTier {
    /// Look up a tier by its request label.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "720p" => Some(QualityTier::Q720p),
            "1080p" => Some(QualityTier::Q1080p),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QualityTier::Q720p => "720p",
            QualityTier::Q1080p => "1080p",
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            QualityTier::Q720p => 1280,
            QualityTier::Q1080p => 1920,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            QualityTier::Q720p => 720,
            QualityTier::Q1080p => 1080,
        }
    }

    pub fn bitrate(&self) -> &'static str {
        match self {
            QualityTier::Q720p => "2500k",
            QualityTier::Q1080p => "5000k",
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Session lifecycle. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscodeState {
    Pending,
    Started,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl TranscodeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TranscodeState::Completed | TranscodeState::Failed | TranscodeState::Cancelled
        )
    }
}

/// One transcoding request and its owned encoder process.
#[derive(Debug)]
pub struct TranscodeSession {
    pub id: Uuid,
    pub filename: String,
    pub tier: QualityTier,
    pub started_at: DateTime<Utc>,
    state: Mutex<TranscodeState>,
}

impl TranscodeSession {
    fn new(filename: String, tier: QualityTier) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename,
            tier,
            started_at: Utc::now(),
            state: Mutex::new(TranscodeState::Pending),
        }
    }

    pub fn state(&self) -> TranscodeState {
        *self.state.lock()
    }

    /// Advance the state machine. Transitions out of a terminal state are
    /// ignored so races between completion and cancellation stay benign.
    fn advance(&self, next: TranscodeState) {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return;
        }
        tracing::debug!(
            session_id = %self.id,
            from = ?*state,
            to = ?next,
            "Transcode state transition"
        );
        *state = next;
    }

    /// First encoder output observed; marks the streaming phase.
    fn mark_streaming(&self) {
        let mut state = self.state.lock();
        if matches!(*state, TranscodeState::Pending | TranscodeState::Started) {
            tracing::info!(
                session_id = %self.id,
                tier = %self.tier,
                "Streaming started"
            );
            *state = TranscodeState::Streaming;
        }
    }

    fn is_streaming(&self) -> bool {
        *self.state.lock() == TranscodeState::Streaming
    }
}

/// Snapshot of an active session for observability.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub filename: String,
    pub tier: QualityTier,
    pub state: TranscodeState,
    pub started_at: DateTime<Utc>,
}

/// Tracks in-flight transcode sessions.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, Arc<TranscodeSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, session: Arc<TranscodeSession>) {
        tracing::info!(
            session_id = %session.id,
            filename = %session.filename,
            tier = %session.tier,
            "Registered transcode session"
        );
        self.sessions.insert(session.id, session);
    }

    fn finish(&self, id: Uuid) {
        if let Some((_, session)) = self.sessions.remove(&id) {
            tracing::info!(
                session_id = %id,
                state = ?session.state(),
                duration_secs = (Utc::now() - session.started_at).num_seconds(),
                "Transcode session ended"
            );
        }
    }

    /// Snapshots of all active sessions.
    pub fn active(&self) -> Vec<SessionInfo> {
        self.sessions
            .iter()
            .map(|entry| {
                let s = entry.value();
                SessionInfo {
                    id: s.id,
                    filename: s.filename.clone(),
                    tier: s.tier,
                    state: s.state(),
                    started_at: s.started_at,
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Build the ffmpeg argument list for a progressive transcode to `tier`.
pub fn ffmpeg_args(input: &Path, tier: QualityTier) -> Vec<String> {
    let scale = format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
        w = tier.width(),
        h = tier.height()
    );

    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        // Video
        "-c:v".into(),
        "libx264".into(),
        "-b:v".into(),
        tier.bitrate().into(),
        "-vf".into(),
        scale,
        // Audio
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "128k".into(),
        "-ac".into(),
        "2".into(),
        // Fragmented output: playable before the encode finishes
        "-movflags".into(),
        "+frag_keyframe+empty_moov+default_base_moof".into(),
        // Latency over compression efficiency
        "-preset".into(),
        "veryfast".into(),
        "-profile:v".into(),
        "baseline".into(),
        "-level".into(),
        "3.0".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-g".into(),
        "48".into(),
        "-keyint_min".into(),
        "48".into(),
        "-sc_threshold".into(),
        "0".into(),
        "-f".into(),
        "mp4".into(),
        "pipe:1".into(),
    ]
}

/// Start a transcode and return the progressive response.
///
/// Headers are committed immediately; output length is unknowable up
/// front. A spawn failure surfaces as `TranscodeError` (500) since no
/// headers have been sent yet.
pub async fn stream_transcoded(
    ffmpeg: &Path,
    input: &Path,
    filename: &str,
    tier: QualityTier,
    registry: Arc<SessionRegistry>,
) -> Result<Response, MediaError> {
    let session = Arc::new(TranscodeSession::new(filename.to_string(), tier));

    let child = Command::new(ffmpeg)
        .args(ffmpeg_args(input, tier))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| MediaError::Transcode(format!("failed to start ffmpeg: {}", e)))?;

    tracing::info!(
        session_id = %session.id,
        filename = %session.filename,
        tier = %tier,
        "Starting transcode"
    );
    session.advance(TranscodeState::Started);
    registry.register(session.clone());

    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(CHANNEL_DEPTH);
    tokio::spawn(pump(child, session, tx, DISCONNECT_GRACE, registry));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .map_err(|e| MediaError::Transcode(e.to_string()))
}

/// Forward encoder output to the response channel, enforcing the
/// cancellation policy and reaping the child exactly once.
async fn pump(
    mut child: Child,
    session: Arc<TranscodeSession>,
    tx: mpsc::Sender<Result<Bytes, std::io::Error>>,
    grace: Duration,
    registry: Arc<SessionRegistry>,
) {
    let Some(mut stdout) = child.stdout.take() else {
        tracing::error!(session_id = %session.id, "Encoder stdout unavailable");
        terminate(&mut child).await;
        session.advance(TranscodeState::Failed);
        registry.finish(session.id);
        return;
    };

    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        tokio::select! {
            read = stdout.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => {
                    session.mark_streaming();
                    let chunk = Bytes::copy_from_slice(&buf[..n]);
                    if tx.send(Ok(chunk)).await.is_err() {
                        // Response body dropped between reads.
                        cancel(&mut child, &session, grace).await;
                        registry.finish(session.id);
                        return;
                    }
                }
                Err(e) => {
                    tracing::error!(session_id = %session.id, error = %e, "Encoder read failed");
                    terminate(&mut child).await;
                    session.advance(TranscodeState::Failed);
                    registry.finish(session.id);
                    return;
                }
            },
            // Client went away; the response body was dropped.
            _ = tx.closed() => {
                cancel(&mut child, &session, grace).await;
                registry.finish(session.id);
                return;
            }
        }
    }

    // Encoder finished; close the response stream.
    drop(tx);

    match child.wait().await {
        Ok(status) if status.success() => {
            tracing::info!(session_id = %session.id, tier = %session.tier, "Transcode completed");
            session.advance(TranscodeState::Completed);
        }
        Ok(status) => {
            tracing::error!(session_id = %session.id, %status, "Encoder exited with error");
            session.advance(TranscodeState::Failed);
        }
        Err(e) => {
            tracing::error!(session_id = %session.id, error = %e, "Failed to reap encoder");
            session.advance(TranscodeState::Failed);
        }
    }
    registry.finish(session.id);
}

/// Apply the cancellation policy after a client disconnect. Not logged as
/// a failure: the client closing the stream is expected behavior.
async fn cancel(child: &mut Child, session: &TranscodeSession, grace: Duration) {
    if session.is_streaming() {
        tracing::info!(
            session_id = %session.id,
            "Client disconnected mid-stream, terminating encoder"
        );
    } else {
        tracing::info!(
            session_id = %session.id,
            grace_ms = grace.as_millis() as u64,
            "Client disconnected before streaming started"
        );
        tokio::time::sleep(grace).await;
    }
    terminate(child).await;
    session.advance(TranscodeState::Cancelled);
}

/// Kill and reap the child. Safe to reach after the process has already
/// exited; double-termination is a no-op.
async fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "Encoder already terminated");
    }
    let _ = child.wait().await;
}
