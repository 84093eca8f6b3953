//! Data models for transcription.

use serde::{Deserialize, Serialize};

/// A transcript of one clip's audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Individual segments with timestamps relative to the clip start.
    pub segments: Vec<TranscriptSegment>,
    /// Full transcript text (concatenated segments).
    pub full_text: String,
    /// Language reported by the service, if any.
    pub language: Option<String>,
}

impl Transcript {
    /// Create a new transcript from segments.
    pub fn new(segments: Vec<TranscriptSegment>, language: Option<String>) -> Self {
        let full_text = segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            segments,
            full_text,
            language,
        }
    }

    /// Whether the transcript carries any speech.
    pub fn is_empty(&self) -> bool {
        self.full_text.trim().is_empty()
    }
}

/// A single segment of a transcript with timestamp information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds.
    pub start_seconds: f64,
    /// End time in seconds.
    pub end_seconds: f64,
    /// Transcribed text content.
    pub text: String,
}

impl TranscriptSegment {
    /// Create a new transcript segment.
    pub fn new(start_seconds: f64, end_seconds: f64, text: String) -> Self {
        Self {
            start_seconds,
            end_seconds,
            text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_creation() {
        let segments = vec![
            TranscriptSegment::new(0.0, 5.0, " Hello world ".to_string()),
            TranscriptSegment::new(5.0, 7.0, "  ".to_string()),
            TranscriptSegment::new(7.0, 10.0, "This is a test".to_string()),
        ];

        let transcript = Transcript::new(segments, Some("en".to_string()));
        assert_eq!(transcript.full_text, "Hello world This is a test");
        assert!(!transcript.is_empty());
        assert!(Transcript::new(Vec::new(), None).is_empty());
    }
}
