//! Generation through a local Ollama server.

use super::{strip_reasoning, Generator};
use crate::config::GenerationSettings;
use crate::error::{KlippError, Result};
use crate::http::{endpoint, http_client, parse_base_url};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Default Ollama API base URL.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

/// Generator backed by Ollama's `/api/generate`.
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: Url,
    model: String,
    temperature: f32,
}

impl OllamaGenerator {
    /// Create a generator for `model` on the Ollama server at `base_url`.
    pub fn new(base_url: &str, model: &str, temperature: f32, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: parse_base_url(base_url)?,
            model: model.to_string(),
            temperature,
        })
    }

    pub fn from_settings(settings: &GenerationSettings) -> Result<Self> {
        Self::new(
            settings.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL),
            &settings.model,
            settings.temperature,
            Duration::from_secs(settings.timeout_seconds),
        )
    }

    /// List the models the server has pulled.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(endpoint(&self.base_url, "api/tags")?)
            .send()
            .await?
            .error_for_status()?;

        let tags: TagsResponse = response.json().await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Check that the server is reachable and has the configured model.
    pub async fn health(&self) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models
            .iter()
            .any(|m| m == &self.model || m.split(':').next() == Some(self.model.as_str())))
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "api/generate")?)
            .json(&request)
            .send()
            .await
            .map_err(|e| KlippError::Generation(format!("Ollama request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KlippError::Generation(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| KlippError::Generation(format!("Invalid Ollama response: {}", e)))?;

        debug!("Generated {} characters", body.response.len());
        Ok(strip_reasoning(&body.response))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request = GenerateRequest {
            model: "qwen3:0.6b",
            prompt: "Question?",
            system: "",
            stream: false,
            options: GenerateOptions { temperature: 0.7 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "qwen3:0.6b");
        assert_eq!(json["stream"], false);
        assert!(json.get("system").is_none());
        assert!((json["options"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let result = OllamaGenerator::new("ftp://host", "m", 0.7, Duration::from_secs(1));
        assert!(matches!(result, Err(KlippError::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let generator =
            OllamaGenerator::new("http://127.0.0.1:9", "m", 0.7, Duration::from_secs(2)).unwrap();
        let err = generator.generate("", "hi").await.unwrap_err();
        assert!(matches!(err, KlippError::Generation(_)));
        assert!(generator.health().await.is_err());
    }
}
