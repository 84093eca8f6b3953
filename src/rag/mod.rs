//! RAG (Retrieval-Augmented Generation) over indexed clips.
//!
//! Retrieves the clips closest to a question and asks the generator to answer
//! from them, returning the clips as sources.

pub mod context;
mod response;

pub use context::ContextBuilder;
pub use response::{RagEngine, RagResponse, NO_CONTEXT_ANSWER};

use crate::vector_store::SearchResult;
use serde::Serialize;
use uuid::Uuid;

/// A retrieved clip prepared for prompting and display.
#[derive(Debug, Clone, Serialize)]
pub struct ContextClip {
    pub clip_id: Uuid,
    pub video_id: String,
    pub video_title: String,
    /// Formatted time range (e.g., "02:30 - 03:00").
    pub timestamp: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub transcript: Option<String>,
    pub visual_description: String,
    /// Path to the clip video file.
    pub clip_path: String,
    /// Similarity score.
    pub score: f32,
}

impl From<SearchResult> for ContextClip {
    fn from(result: SearchResult) -> Self {
        let timestamp = result.clip.format_range();
        let clip = result.clip;
        Self {
            clip_id: clip.id,
            video_id: clip.video_id,
            video_title: clip.video_title,
            timestamp,
            start_seconds: clip.start_seconds,
            end_seconds: clip.end_seconds,
            transcript: clip.transcript,
            visual_description: clip.visual_description,
            clip_path: clip.clip_path,
            score: result.score,
        }
    }
}
