//! HTTP client for an external multimodal embedding service.
//!
//! The service exposes `POST /embed` taking
//! `{"modality": "text" | "vision" | "audio", "inputs": [...]}`, where text
//! inputs are the strings themselves and media inputs are file paths readable
//! by the service, and answers `{"embeddings": [[f32, ...], ...]}` in input order.

use super::{Embedder, Modality};
use crate::config::EmbeddingSettings;
use crate::error::{KlippError, Result};
use crate::http::{endpoint, http_client, parse_base_url};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Embedder backed by an HTTP embedding service.
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: Url,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    modality: Modality,
    inputs: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl HttpEmbedder {
    /// Create an embedder for the service at `base_url`.
    pub fn new(base_url: &str, dimensions: usize, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: parse_base_url(base_url)?,
            dimensions,
        })
    }

    /// Create an embedder from settings.
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        Self::new(
            &settings.base_url,
            settings.dimensions as usize,
            Duration::from_secs(settings.timeout_seconds),
        )
    }

    /// Embed several inputs of one modality in a single request.
    #[instrument(skip(self, inputs), fields(modality = %modality, count = inputs.len()))]
    pub async fn embed_batch(&self, modality: Modality, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = endpoint(&self.base_url, "embed")?;
        let response = self
            .client
            .post(url)
            .json(&EmbedRequest { modality, inputs })
            .send()
            .await
            .map_err(|e| KlippError::Embedding(format!("Embedding service unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KlippError::Embedding(format!(
                "Embedding service returned {}: {}",
                status,
                body.trim()
            )));
        }

        let body: EmbedResponse = response.json().await?;
        let embeddings = check_response(body, inputs.len())?;
        debug!("Generated {} embeddings", embeddings.len());
        Ok(embeddings)
    }

    /// Check whether the service answers on `/health`.
    pub async fn health(&self) -> bool {
        let Ok(url) = endpoint(&self.base_url, "health") else {
            return false;
        };
        match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Base URL of the service.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

fn check_response(body: EmbedResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    if body.embeddings.len() != expected {
        return Err(KlippError::Embedding(format!(
            "Expected {} embeddings, service returned {}",
            expected,
            body.embeddings.len()
        )));
    }
    Ok(body.embeddings)
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(Modality::Text, &[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| KlippError::Embedding("Empty embedding response".to_string()))
    }

    async fn embed_media(&self, modality: Modality, path: &Path) -> Result<Vec<f32>> {
        let path = path.to_str().ok_or_else(|| {
            KlippError::InvalidInput(format!("Non UTF-8 path: {}", path.display()))
        })?;

        self.embed_batch(modality, &[path.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| KlippError::Embedding("Empty embedding response".to_string()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
