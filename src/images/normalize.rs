//! HEIC still-image normalization.
//!
//! HEIC payloads are HEVC stills, which nothing in the pure-Rust image
//! stack decodes. Conversion is a one-shot piped ffmpeg run: the source
//! buffer goes in on stdin, a single JPEG frame comes back on stdout.
//! Stateless per call; nothing is retained between invocations.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::error::MediaError;

/// Map a 0.0–1.0 quality factor to mjpeg's `-q:v` scale (2 best, 31 worst).
fn mjpeg_qscale(quality: f32) -> u32 {
    let quality = quality.clamp(0.0, 1.0);
    (2.0 + (1.0 - quality) * 29.0).round() as u32
}

/// Decode a HEIC buffer into a JPEG at the given quality factor.
///
/// Malformed input or an encoder failure surfaces as `DecodeError`;
/// the server process is never taken down by a bad still.
pub async fn normalize(ffmpeg: &Path, input: &[u8], quality: f32) -> Result<Vec<u8>, MediaError> {
    let mut child = Command::new(ffmpeg)
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            "pipe:0",
            "-frames:v",
            "1",
            "-q:v",
        ])
        .arg(mjpeg_qscale(quality).to_string())
        .args(["-f", "mjpeg", "pipe:1"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| MediaError::Decode(format!("failed to start ffmpeg: {}", e)))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| MediaError::Decode("ffmpeg stdin unavailable".into()))?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| MediaError::Decode("ffmpeg stdout unavailable".into()))?;

    // Feed stdin from a separate task so a full stdout pipe cannot
    // deadlock the write.
    let payload = input.to_vec();
    let writer = tokio::spawn(async move {
        let _ = stdin.write_all(&payload).await;
        // Dropping stdin closes the pipe and signals EOF to the decoder.
    });

    let mut output = Vec::new();
    stdout
        .read_to_end(&mut output)
        .await
        .map_err(|e| MediaError::Decode(format!("reading ffmpeg output: {}", e)))?;

    let status = child
        .wait()
        .await
        .map_err(|e| MediaError::Decode(format!("waiting for ffmpeg: {}", e)))?;
    let _ = writer.await;

    if !status.success() {
        return Err(MediaError::Decode(format!(
            "ffmpeg exited with status {}",
            status
        )));
    }
    if output.is_empty() {
        return Err(MediaError::Decode("ffmpeg produced no output".into()));
    }

    Ok(output)
}
