//! Speech recognition client
//!
//! The ASR engine is an external collaborator: WAV bytes in, transcript out.
//! This wraps an OpenAI-compatible transcription endpoint; when no backend
//! is configured the gateway runs, reports `asr_loaded = false`, and every
//! segment produces a recognition error frame for the speaker.

use crate::config::AsrConfig;
use crate::{Error, Result};

/// Response from the transcription API
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcribes speech segments to text
pub struct Recognizer {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    language: Option<String>,
}

impl Recognizer {
    /// Create a recognizer from configuration
    ///
    /// Returns `None` when no backend endpoint is configured; the pipeline
    /// treats that as "ASR not loaded".
    #[must_use]
    pub fn from_config(config: &AsrConfig) -> Option<Self> {
        let base_url = config.base_url.clone()?;
        Some(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            language: config.language.clone(),
        })
    }

    /// Transcribe a WAV segment to text
    ///
    /// An empty transcript is returned as-is; the pipeline decides how to
    /// surface it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects it
    pub async fn recognize(&self, wav: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), "starting transcription");

        let part = reqwest::multipart::Part::bytes(wav.to_vec())
            .file_name("segment.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::Recognition(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());
        if let Some(ref lang) = self.language {
            form = form.text("language", lang.clone());
        }

        let mut request = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .multipart(form);
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "transcription request failed");
            Error::Recognition(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Recognition(format!("ASR error {status}: {body}")));
        }

        let result: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| Error::Recognition(format!("unreadable ASR response: {e}")))?;

        // Whisper-style backends pad CJK output with spaces
        let text = result.text.replace(' ', "");
        tracing::info!(transcript = %text, "transcription complete");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_backend_is_none() {
        let config = AsrConfig::default();
        assert!(Recognizer::from_config(&config).is_none());
    }

    #[test]
    fn configured_backend_builds() {
        let config = AsrConfig {
            base_url: Some("http://localhost:9000/v1/".to_string()),
            ..AsrConfig::default()
        };
        let rec = Recognizer::from_config(&config).unwrap();
        assert_eq!(rec.base_url, "http://localhost:9000/v1");
    }
}
