//! Answer generation backends.
//!
//! A [`Generator`] turns a rendered prompt into an answer. Two backends are
//! available: a local Ollama server and any OpenAI-compatible chat endpoint.

mod ollama;
mod openai;

pub use ollama::OllamaGenerator;
pub use openai::OpenAIGenerator;

use crate::config::{GenerationProvider, GenerationSettings};
use crate::error::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, OnceLock};

/// Trait for text generation backends.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a completion for `prompt` under the given system prompt.
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;

    /// Model name used for generation.
    fn model(&self) -> &str;
}

/// Build the generator configured in `settings`.
pub fn create_generator(settings: &GenerationSettings) -> Result<Arc<dyn Generator>> {
    let generator: Arc<dyn Generator> = match settings.provider {
        GenerationProvider::Ollama => Arc::new(OllamaGenerator::from_settings(settings)?),
        GenerationProvider::OpenAI => Arc::new(OpenAIGenerator::from_settings(settings)?),
    };
    Ok(generator)
}

/// Remove `<think>...</think>` reasoning blocks emitted by reasoning models.
pub fn strip_reasoning(text: &str) -> String {
    static THINK: OnceLock<Regex> = OnceLock::new();
    let re = THINK.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));
    re.replace_all(text, "").trim().to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Generator that echoes a fixed answer and records prompts.
    pub struct FakeGenerator {
        pub answer: String,
        pub prompts: Mutex<Vec<String>>,
    }

    impl FakeGenerator {
        pub fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn prompt_count(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Generator for FakeGenerator {
        async fn generate(&self, _system: &str, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.answer.clone())
        }

        fn model(&self) -> &str {
            "fake"
        }
    }

    #[test]
    fn test_strip_reasoning() {
        let raw = "<think>\nThe user wants...\n</think>\n\nA dog runs across the field.";
        assert_eq!(strip_reasoning(raw), "A dog runs across the field.");
        assert_eq!(strip_reasoning("  plain answer "), "plain answer");
    }

    #[test]
    fn test_create_generator_by_provider() {
        let settings = GenerationSettings::default();
        let generator = create_generator(&settings).unwrap();
        assert_eq!(generator.model(), "qwen3:0.6b");

        let settings = GenerationSettings {
            provider: GenerationProvider::OpenAI,
            base_url: Some("http://127.0.0.1:8000/v1".to_string()),
            model: "gpt-4o-mini".to_string(),
            ..Default::default()
        };
        let generator = create_generator(&settings).unwrap();
        assert_eq!(generator.model(), "gpt-4o-mini");
    }
}
