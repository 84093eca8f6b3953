//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{
    check_clip_dimensions, check_query_dimensions, cosine_similarity, rank, ClipRecord,
    IndexedVideo, SearchResult, VectorStore, VideoRecord,
};
use crate::error::{KlippError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    videos: HashMap<String, VideoRecord>,
    clips: HashMap<Uuid, ClipRecord>,
}

/// In-memory vector store.
pub struct MemoryVectorStore {
    inner: RwLock<Inner>,
    dimensions: usize,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new(dimensions: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            dimensions,
        }
    }

    fn poisoned<E: std::fmt::Display>(e: E) -> KlippError {
        KlippError::VectorStore(format!("Store lock poisoned: {}", e))
    }

    fn summarize(inner: &Inner, video: &VideoRecord) -> IndexedVideo {
        let clip_count = inner
            .clips
            .values()
            .filter(|c| c.video_id == video.video_id)
            .count() as u32;

        IndexedVideo {
            video_id: video.video_id.clone(),
            title: video.title.clone(),
            source_path: video.source_path.clone(),
            duration_seconds: video.duration_seconds,
            has_audio: video.has_audio,
            clip_count,
            processed_at: video.processed_at,
        }
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn index_video(&self, video: &VideoRecord, clips: &[ClipRecord]) -> Result<usize> {
        check_clip_dimensions(clips, self.dimensions)?;

        let mut inner = self.inner.write().map_err(Self::poisoned)?;
        inner.clips.retain(|_, c| c.video_id != video.video_id);
        inner.videos.insert(video.video_id.clone(), video.clone());
        for clip in clips {
            inner.clips.insert(clip.id, clip.clone());
        }
        Ok(clips.len())
    }

    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
        video_id: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        check_query_dimensions(query_embedding, self.dimensions)?;

        let inner = self.inner.read().map_err(Self::poisoned)?;
        let scored: Vec<SearchResult> = inner
            .clips
            .values()
            .filter(|c| video_id.map_or(true, |id| c.video_id == id))
            .map(|clip| SearchResult {
                score: cosine_similarity(query_embedding, &clip.embedding),
                clip: clip.clone(),
            })
            .collect();

        Ok(rank(scored, limit, min_score))
    }

    async fn delete_video(&self, video_id: &str) -> Result<usize> {
        let mut inner = self.inner.write().map_err(Self::poisoned)?;
        let initial_len = inner.clips.len();
        inner.clips.retain(|_, c| c.video_id != video_id);
        inner.videos.remove(video_id);
        Ok(initial_len - inner.clips.len())
    }

    async fn list_videos(&self) -> Result<Vec<IndexedVideo>> {
        let inner = self.inner.read().map_err(Self::poisoned)?;
        let mut videos: Vec<IndexedVideo> = inner
            .videos
            .values()
            .map(|v| Self::summarize(&inner, v))
            .collect();
        videos.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        Ok(videos)
    }

    async fn get_video(&self, video_id: &str) -> Result<Option<IndexedVideo>> {
        let inner = self.inner.read().map_err(Self::poisoned)?;
        Ok(inner
            .videos
            .get(video_id)
            .map(|v| Self::summarize(&inner, v)))
    }

    async fn get_clips(&self, video_id: &str) -> Result<Vec<ClipRecord>> {
        let inner = self.inner.read().map_err(Self::poisoned)?;
        let mut result: Vec<ClipRecord> = inner
            .clips
            .values()
            .filter(|c| c.video_id == video_id)
            .cloned()
            .collect();
        result.sort_by_key(|c| c.clip_order);
        Ok(result)
    }

    async fn get_clip(&self, id: Uuid) -> Result<Option<ClipRecord>> {
        let inner = self.inner.read().map_err(Self::poisoned)?;
        Ok(inner.clips.get(&id).cloned())
    }

    async fn clip_count(&self) -> Result<usize> {
        let inner = self.inner.read().map_err(Self::poisoned)?;
        Ok(inner.clips.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::tests::{clip, video};

    #[tokio::test]
    async fn test_memory_vector_store() {
        let store = MemoryVectorStore::new(3);

        let clips = vec![
            clip("video1", 0, vec![1.0, 0.0, 0.0]),
            clip("video1", 1, vec![0.0, 1.0, 0.0]),
        ];
        store.index_video(&video("video1"), &clips).await.unwrap();

        assert_eq!(store.clip_count().await.unwrap(), 2);

        let results = store.search(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score > results[1].score);

        let videos = store.list_videos().await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].clip_count, 2);

        let ordered = store.get_clips("video1").await.unwrap();
        assert_eq!(ordered[0].clip_order, 0);
        assert_eq!(ordered[1].clip_order, 1);
    }

    #[tokio::test]
    async fn test_min_score_and_scope() {
        let store = MemoryVectorStore::new(2);
        store
            .index_video(&video("a"), &[clip("a", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .index_video(&video("b"), &[clip("b", 0, vec![0.0, 1.0])])
            .await
            .unwrap();

        let results = store
            .search_with_threshold(&[1.0, 0.0], 10, 0.5, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].clip.video_id, "a");

        let scoped = store
            .search_with_threshold(&[1.0, 0.0], 10, 0.0, Some("b"))
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].clip.video_id, "b");

        assert_eq!(store.delete_video("a").await.unwrap(), 1);
        assert!(store.get_video("a").await.unwrap().is_none());
        assert!(store.is_video_indexed("b").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_wrong_dimensions() {
        let store = MemoryVectorStore::new(3);
        let result = store
            .index_video(&video("a"), &[clip("a", 0, vec![1.0])])
            .await;
        assert!(result.is_err());
        assert_eq!(store.clip_count().await.unwrap(), 0);
    }
}
