//! RAG response generation.

use super::{context::format_context_for_prompt, ContextBuilder, ContextClip};
use crate::config::Prompts;
use crate::embedding::Embedder;
use crate::error::{KlippError, Result};
use crate::generation::Generator;
use crate::vector_store::VectorStore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Answer returned when retrieval finds nothing to ground on.
pub const NO_CONTEXT_ANSWER: &str =
    "No relevant clips were found for this question. Try rephrasing it.";

/// RAG engine for question answering.
pub struct RagEngine {
    generator: Arc<dyn Generator>,
    context_builder: ContextBuilder,
    prompts: Prompts,
}

impl RagEngine {
    /// Create a new RAG engine.
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        max_context_clips: usize,
        min_score: f32,
    ) -> Self {
        let context_builder = ContextBuilder::new(vector_store, embedder)
            .with_max_clips(max_context_clips)
            .with_min_score(min_score);

        Self {
            generator,
            context_builder,
            prompts: Prompts::default(),
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Ask a question, optionally restricted to one video.
    #[instrument(skip(self), fields(question = %question))]
    pub async fn ask(&self, question: &str, video_id: Option<&str>) -> Result<RagResponse> {
        let question = question.trim();
        if question.is_empty() {
            return Err(KlippError::InvalidInput("Question is empty".to_string()));
        }
        info!("Processing question: {}", question);

        let context_clips = self.context_builder.build(question, video_id).await?;

        if context_clips.is_empty() {
            return Ok(RagResponse {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert(
            "context".to_string(),
            format_context_for_prompt(&context_clips),
        );

        let user_prompt = self
            .prompts
            .render_with_custom(&self.prompts.generation.user, &vars);
        let system_prompt = self
            .prompts
            .render_with_custom(&self.prompts.generation.system, &vars);

        let answer = self.generator.generate(&system_prompt, &user_prompt).await?;

        debug!("Generated response with {} sources", context_clips.len());

        Ok(RagResponse {
            answer,
            sources: context_clips,
        })
    }
}

/// A RAG response with answer and sources.
#[derive(Debug, Clone, Serialize)]
pub struct RagResponse {
    /// The generated answer.
    pub answer: String,
    /// Clips used for the answer, best first.
    pub sources: Vec<ContextClip>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::tests::FakeEmbedder;
    use crate::generation::tests::FakeGenerator;
    use crate::vector_store::tests::{clip, video};
    use crate::vector_store::MemoryVectorStore;

    async fn engine(generator: Arc<FakeGenerator>) -> RagEngine {
        let store = Arc::new(MemoryVectorStore::new(2));
        store
            .index_video(&video("a"), &[clip("a", 0, vec![1.0, 0.0])])
            .await
            .unwrap();

        let embedder = Arc::new(
            FakeEmbedder::new(2)
                .with("What is shown?", vec![1.0, 0.0])
                .with("Unrelated?", vec![0.0, 1.0]),
        );

        RagEngine::new(store, embedder, generator, 3, 0.5)
    }

    #[tokio::test]
    async fn test_ask_renders_prompt_and_returns_sources() {
        let generator = Arc::new(FakeGenerator::new("A field."));
        let engine = engine(generator.clone()).await;

        let response = engine.ask("What is shown?", None).await.unwrap();
        assert_eq!(response.answer, "A field.");
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].video_id, "a");

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].starts_with("Analyze the video content and answer the question."));
        assert!(prompts[0].contains("Clip 1:\nTime: 0.0-30.0"));
        assert!(prompts[0].contains("Question: What is shown?"));
    }

    #[tokio::test]
    async fn test_no_context_skips_generation() {
        let generator = Arc::new(FakeGenerator::new("unused"));
        let engine = engine(generator.clone()).await;

        let response = engine.ask("Unrelated?", None).await.unwrap();
        assert_eq!(response.answer, NO_CONTEXT_ANSWER);
        assert!(response.sources.is_empty());
        assert_eq!(generator.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let engine = engine(Arc::new(FakeGenerator::new("x"))).await;
        let result = engine.ask("   ", None).await;
        assert!(matches!(result, Err(KlippError::InvalidInput(_))));
    }
}
