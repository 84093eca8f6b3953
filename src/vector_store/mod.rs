//! Vector store abstraction for indexed clips.
//!
//! Provides a trait-based interface for storing clip embeddings and metadata
//! and retrieving the nearest clips for a query embedding.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::error::{KlippError, Result};
use crate::media::format_timestamp;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An indexed clip: metadata plus its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipRecord {
    /// Unique clip ID.
    pub id: Uuid,
    /// Source video ID.
    pub video_id: String,
    /// Source video title.
    pub video_title: String,
    /// Order of this clip in the video.
    pub clip_order: i32,
    /// Start time in the source video (seconds).
    pub start_seconds: f64,
    /// End time in the source video (seconds).
    pub end_seconds: f64,
    /// Transcript of the clip audio, if any.
    pub transcript: Option<String>,
    /// Coarse description derived from the embedding.
    pub visual_description: String,
    /// Path to the clip video file.
    pub clip_path: String,
    /// Path to the clip audio file, if any.
    pub audio_path: Option<String>,
    /// Embedding vector.
    #[serde(skip)]
    pub embedding: Vec<f32>,
    /// When this clip was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl ClipRecord {
    /// Create a new clip record.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        video_id: String,
        video_title: String,
        clip_order: i32,
        start_seconds: f64,
        end_seconds: f64,
        transcript: Option<String>,
        visual_description: String,
        clip_path: String,
        audio_path: Option<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            video_id,
            video_title,
            clip_order,
            start_seconds,
            end_seconds,
            transcript,
            visual_description,
            clip_path,
            audio_path,
            embedding,
            indexed_at: Utc::now(),
        }
    }

    /// Format the clip's time range for display.
    pub fn format_range(&self) -> String {
        format!(
            "{} - {}",
            format_timestamp(self.start_seconds),
            format_timestamp(self.end_seconds)
        )
    }
}

/// A search result with score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched clip.
    pub clip: ClipRecord,
    /// Cosine similarity (higher is better).
    pub score: f32,
}

/// A processed source video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    /// Where the source file was read from.
    pub source_path: String,
    pub duration_seconds: f64,
    pub has_audio: bool,
    pub processed_at: DateTime<Utc>,
}

/// Summary information about an indexed video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedVideo {
    pub video_id: String,
    pub title: String,
    pub source_path: String,
    pub duration_seconds: f64,
    pub has_audio: bool,
    /// Number of indexed clips.
    pub clip_count: u32,
    pub processed_at: DateTime<Utc>,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Dimensionality every stored embedding must have.
    fn dimensions(&self) -> usize;

    /// Replace a video and all its clips in one step.
    ///
    /// Fails without changes if any clip has an embedding of the wrong length.
    async fn index_video(&self, video: &VideoRecord, clips: &[ClipRecord]) -> Result<usize>;

    /// Search for the nearest clips.
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        self.search_with_threshold(query_embedding, limit, 0.0, None)
            .await
    }

    /// Search with a minimum similarity and an optional video scope.
    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
        video_id: Option<&str>,
    ) -> Result<Vec<SearchResult>>;

    /// Delete a video and its clips, returning the number of clips removed.
    async fn delete_video(&self, video_id: &str) -> Result<usize>;

    /// List all indexed videos, most recent first.
    async fn list_videos(&self) -> Result<Vec<IndexedVideo>>;

    /// Get a specific video's information.
    async fn get_video(&self, video_id: &str) -> Result<Option<IndexedVideo>>;

    /// Check if a video is indexed.
    async fn is_video_indexed(&self, video_id: &str) -> Result<bool> {
        Ok(self.get_video(video_id).await?.is_some())
    }

    /// Get all clips of a video in order.
    async fn get_clips(&self, video_id: &str) -> Result<Vec<ClipRecord>>;

    /// Get one clip by ID.
    async fn get_clip(&self, id: Uuid) -> Result<Option<ClipRecord>>;

    /// Get total clip count.
    async fn clip_count(&self) -> Result<usize>;
}

/// Reject clips whose embedding does not have `dimensions` entries.
pub(crate) fn check_clip_dimensions(clips: &[ClipRecord], dimensions: usize) -> Result<()> {
    if let Some(bad) = clips.iter().find(|c| c.embedding.len() != dimensions) {
        return Err(KlippError::VectorStore(format!(
            "Clip {} has {} dimensions, index expects {}",
            bad.id,
            bad.embedding.len(),
            dimensions
        )));
    }
    Ok(())
}

/// Reject a query embedding of the wrong length.
pub(crate) fn check_query_dimensions(query: &[f32], dimensions: usize) -> Result<()> {
    if query.len() != dimensions {
        return Err(KlippError::VectorStore(format!(
            "Query has {} dimensions, index expects {}",
            query.len(),
            dimensions
        )));
    }
    Ok(())
}

/// Rank scored clips: drop those under `min_score`, sort descending, keep `limit`.
pub(crate) fn rank(mut results: Vec<SearchResult>, limit: usize, min_score: f32) -> Vec<SearchResult> {
    results.retain(|r| r.score >= min_score);
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(limit);
    results
}

/// Compute cosine similarity between two vectors.
///
/// Equivalent to the inner product of the L2-normalized vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A clip with the given embedding, for store tests.
    pub fn clip(video_id: &str, order: i32, embedding: Vec<f32>) -> ClipRecord {
        ClipRecord::new(
            video_id.to_string(),
            format!("Video {}", video_id),
            order,
            order as f64 * 30.0,
            (order + 1) as f64 * 30.0,
            Some(format!("transcript {}", order)),
            "Scene/Background (feature #0)".to_string(),
            format!("/clips/{}_{}.mp4", video_id, order),
            None,
            embedding,
        )
    }

    pub fn video(video_id: &str) -> VideoRecord {
        VideoRecord {
            video_id: video_id.to_string(),
            title: format!("Video {}", video_id),
            source_path: format!("/videos/{}", video_id),
            duration_seconds: 90.0,
            has_audio: true,
            processed_at: Utc::now(),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![2.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[1.0]), 0.0);
    }

    #[test]
    fn test_rank_orders_and_filters() {
        let results = vec![
            SearchResult { clip: clip("v", 0, vec![1.0]), score: 0.2 },
            SearchResult { clip: clip("v", 1, vec![1.0]), score: 0.9 },
            SearchResult { clip: clip("v", 2, vec![1.0]), score: 0.5 },
        ];
        let ranked = rank(results, 2, 0.3);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].clip.clip_order, 1);
        assert_eq!(ranked[1].clip.clip_order, 2);
    }

    #[test]
    fn test_clip_range_format() {
        let c = clip("v", 2, vec![1.0]);
        assert_eq!(c.format_range(), "01:00 - 01:30");
    }
}
