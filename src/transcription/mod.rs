//! Clip audio transcription.
//!
//! Transcripts are optional clip metadata: they enrich the generation prompt
//! but never gate indexing.

mod models;
mod whisper;

pub use models::{Transcript, TranscriptSegment};
pub use whisper::{is_api_key_configured, WhisperTranscriber};

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Trait for transcription services.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio file and return segments with timestamps.
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcript>;
}
