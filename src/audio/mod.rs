//! Audio transcoding via an external ffmpeg process
//!
//! The transcoder is a black box: arbitrary container/codec bytes in,
//! 16 kHz mono WAV out. ffmpeg reads from stdin and writes to stdout so no
//! temp files are involved.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::{Error, Result};

/// Target sample rate handed to the ASR backend
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Converts arbitrary audio segments to fixed-rate mono WAV
pub struct Transcoder {
    ffmpeg: PathBuf,
}

impl Transcoder {
    /// Locate ffmpeg, preferring an explicit path over a PATH lookup
    ///
    /// # Errors
    ///
    /// Returns an error if ffmpeg cannot be found
    pub fn new(explicit_path: Option<&std::path::Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            if path.exists() {
                return Ok(Self { ffmpeg: path.to_path_buf() });
            }
            tracing::warn!(path = %path.display(), "configured ffmpeg path missing, trying PATH");
        }

        let ffmpeg = which::which("ffmpeg")
            .map_err(|e| Error::Transcode(format!("ffmpeg not found: {e}")))?;
        tracing::debug!(ffmpeg = %ffmpeg.display(), "using ffmpeg from PATH");
        Ok(Self { ffmpeg })
    }

    /// Transcode an audio segment to 16 kHz mono WAV bytes
    ///
    /// # Errors
    ///
    /// Returns an error if ffmpeg cannot be spawned or exits non-zero
    pub async fn to_wav(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.ffmpeg)
            .args([
                "-hide_banner",
                "-loglevel", "error",
                "-i", "pipe:0",
                "-ac", "1",
                "-ar", "16000",
                "-f", "wav",
                "pipe:1",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Transcode(format!("cannot spawn ffmpeg: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Transcode("ffmpeg stdin unavailable".to_string()))?;

        // Feed stdin from a separate task: ffmpeg starts writing output
        // before it has consumed all input, so writing inline can deadlock
        // on full pipes for larger segments.
        let payload = input.to_vec();
        let writer = tokio::spawn(async move {
            let _ = stdin.write_all(&payload).await;
            let _ = stdin.shutdown().await;
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::Transcode(format!("ffmpeg wait failed: {e}")))?;
        let _ = writer.await;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Transcode(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        if output.stdout.is_empty() {
            return Err(Error::Transcode("ffmpeg produced no output".to_string()));
        }

        tracing::debug!(
            input_bytes = input.len(),
            wav_bytes = output.stdout.len(),
            "segment transcoded"
        );
        Ok(output.stdout)
    }
}
