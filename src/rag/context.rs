//! Context building for RAG responses.

use super::ContextClip;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::{SearchResult, VectorStore};
use std::sync::Arc;

/// Builds context from search results for RAG.
pub struct ContextBuilder {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    max_clips: usize,
    min_score: f32,
}

impl ContextBuilder {
    /// Create a new context builder.
    pub fn new(vector_store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            vector_store,
            embedder,
            max_clips: 3,
            min_score: 0.0,
        }
    }

    /// Set the maximum number of context clips.
    pub fn with_max_clips(mut self, max_clips: usize) -> Self {
        self.max_clips = max_clips;
        self
    }

    /// Set the minimum similarity score threshold.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Build context for a query, optionally scoped to one video.
    pub async fn build(&self, query: &str, video_id: Option<&str>) -> Result<Vec<ContextClip>> {
        let query_embedding = self.embedder.embed_text(query).await?;

        let results = self
            .vector_store
            .search_with_threshold(&query_embedding, self.max_clips, self.min_score, video_id)
            .await?;

        Ok(Self::from_results(results))
    }

    /// Build context from raw search results.
    pub fn from_results(results: Vec<SearchResult>) -> Vec<ContextClip> {
        results.into_iter().map(ContextClip::from).collect()
    }
}

/// Format context clips for the generation prompt.
///
/// Clips without a transcript are described by their visual label only.
pub fn format_context_for_prompt(clips: &[ContextClip]) -> String {
    clips
        .iter()
        .enumerate()
        .map(|(i, clip)| {
            let mut block = format!(
                "Clip {}:\nTime: {:.1}-{:.1}\n",
                i + 1,
                clip.start_seconds,
                clip.end_seconds
            );
            if let Some(transcript) = clip.transcript.as_deref().filter(|t| !t.trim().is_empty()) {
                block.push_str(&format!("Transcript: {}\n", transcript.trim()));
            }
            block.push_str(&format!("Visual: {}", clip.visual_description));
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::tests::FakeEmbedder;
    use crate::vector_store::tests::{clip, video};
    use crate::vector_store::MemoryVectorStore;

    fn context_clip(transcript: Option<&str>) -> ContextClip {
        let mut record = clip("v", 1, vec![1.0]);
        record.transcript = transcript.map(str::to_string);
        ContextClip::from(SearchResult {
            clip: record,
            score: 0.8,
        })
    }

    #[test]
    fn test_prompt_format() {
        let clips = vec![context_clip(None), context_clip(Some(" hello there "))];
        let text = format_context_for_prompt(&clips);
        assert_eq!(
            text,
            "Clip 1:\nTime: 30.0-60.0\nVisual: Scene/Background (feature #0)\n\n\
             Clip 2:\nTime: 30.0-60.0\nTranscript: hello there\nVisual: Scene/Background (feature #0)"
        );
    }

    #[tokio::test]
    async fn test_build_respects_scope_and_limit() {
        let store = Arc::new(MemoryVectorStore::new(2));
        store
            .index_video(
                &video("a"),
                &[clip("a", 0, vec![1.0, 0.0]), clip("a", 1, vec![0.9, 0.1])],
            )
            .await
            .unwrap();
        store
            .index_video(&video("b"), &[clip("b", 0, vec![1.0, 0.0])])
            .await
            .unwrap();

        let embedder = Arc::new(FakeEmbedder::new(2).with("dog", vec![1.0, 0.0]));
        let builder = ContextBuilder::new(store, embedder).with_max_clips(2);

        let all = builder.build("dog", None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].score >= all[1].score);

        let scoped = builder.build("dog", Some("a")).await.unwrap();
        assert_eq!(scoped.len(), 2);
        assert!(scoped.iter().all(|c| c.video_id == "a"));
    }
}
