//! Generation through an OpenAI-compatible chat completions endpoint.

use super::{strip_reasoning, Generator};
use crate::config::GenerationSettings;
use crate::error::{KlippError, Result};
use crate::http::openai_client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// Generator backed by the chat completions API.
pub struct OpenAIGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIGenerator {
    pub fn new(
        api_base: Option<&str>,
        model: &str,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: openai_client(api_base, timeout)?,
            model: model.to_string(),
            temperature,
        })
    }

    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        Self::new(
            settings.base_url.as_deref(),
            &settings.model,
            settings.temperature,
            Duration::from_secs(settings.timeout_seconds),
        )
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();
        if !system.is_empty() {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system.to_string())
                    .build()
                    .map_err(|e| KlippError::Generation(e.to_string()))?
                    .into(),
            );
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()
                .map_err(|e| KlippError::Generation(e.to_string()))?
                .into(),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| KlippError::Generation(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            KlippError::Generation(format!("Failed to generate response: {}", e))
        })?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| KlippError::Generation("Empty response from LLM".to_string()))?;

        debug!("Generated {} characters", answer.len());
        Ok(strip_reasoning(answer))
    }

    fn model(&self) -> &str {
        &self.model
    }
}
