//! Whisper transcription over an OpenAI-compatible API.
//!
//! Works against OpenAI itself or any server exposing
//! `/audio/transcriptions` (faster-whisper-server, whisper.cpp server, ...).

use super::{Transcriber, Transcript, TranscriptSegment};
use crate::config::TranscriptionSettings;
use crate::error::{KlippError, Result};
use crate::http::openai_client;
use async_openai::types::{AudioInput, AudioResponseFormat, CreateTranscriptionRequestArgs};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default timeout for transcription requests.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Whisper-based transcriber.
pub struct WhisperTranscriber {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    language: Option<String>,
}

impl WhisperTranscriber {
    /// Create a new Whisper transcriber.
    pub fn new(api_base: Option<&str>, model: &str, language: Option<String>) -> Result<Self> {
        Ok(Self {
            client: openai_client(api_base, Duration::from_secs(DEFAULT_TIMEOUT_SECS))?,
            model: model.to_string(),
            language,
        })
    }

    /// Create a transcriber from settings.
    pub fn from_settings(settings: &TranscriptionSettings) -> Result<Self> {
        Self::new(
            settings.base_url.as_deref(),
            &settings.model,
            settings.language.clone(),
        )
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript> {
        let file_bytes = tokio::fs::read(audio_path).await?;

        let mut request_builder = CreateTranscriptionRequestArgs::default();
        request_builder
            .file(AudioInput::from_vec_u8(
                audio_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("audio.wav")
                    .to_string(),
                file_bytes,
            ))
            .model(&self.model)
            .response_format(AudioResponseFormat::VerboseJson);

        if let Some(lang) = &self.language {
            request_builder.language(lang);
        }

        let request = request_builder
            .build()
            .map_err(|e| KlippError::Transcription(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .audio()
            .transcribe_verbose_json(request)
            .await
            .map_err(|e| KlippError::Transcription(format!("Whisper API error: {}", e)))?;

        let segments: Vec<TranscriptSegment> = response
            .segments
            .map(|segs| {
                segs.iter()
                    .map(|s| {
                        TranscriptSegment::new(s.start as f64, s.end as f64, s.text.trim().to_string())
                    })
                    .collect()
            })
            .unwrap_or_else(|| {
                vec![TranscriptSegment::new(
                    0.0,
                    response.duration as f64,
                    response.text.trim().to_string(),
                )]
            });

        debug!("Transcribed {} segments", segments.len());
        Ok(Transcript::new(segments, Some(response.language)))
    }
}

/// Check if the OpenAI API key is configured.
pub fn is_api_key_configured() -> bool {
    std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcriber_creation() {
        let settings = TranscriptionSettings {
            base_url: Some("http://localhost:8000/v1".to_string()),
            ..TranscriptionSettings::default()
        };
        assert!(WhisperTranscriber::from_settings(&settings).is_ok());

        let bad = TranscriptionSettings {
            base_url: Some("localhost".to_string()),
            ..TranscriptionSettings::default()
        };
        assert!(WhisperTranscriber::from_settings(&bad).is_err());
    }
}
