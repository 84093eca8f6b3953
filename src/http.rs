//! HTTP client construction for the external collaborators.

use crate::error::{KlippError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;
use url::Url;

/// Build a plain HTTP client with the given timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| KlippError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Create an OpenAI-compatible client, optionally pointed at a custom API base
/// (a local Whisper server, vLLM, etc.).
pub fn openai_client(api_base: Option<&str>, timeout: Duration) -> Result<Client<OpenAIConfig>> {
    let mut config = OpenAIConfig::default();
    if let Some(base) = api_base {
        let base = parse_base_url(base)?;
        config = config.with_api_base(base.as_str().trim_end_matches('/'));
    }

    Ok(Client::with_config(config).with_http_client(http_client(timeout)?))
}

/// Parse a collaborator base URL, rejecting anything that is not http(s).
pub fn parse_base_url(base: &str) -> Result<Url> {
    let url = Url::parse(base)
        .map_err(|e| KlippError::Config(format!("Invalid URL '{}': {}", base, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(KlippError::Config(format!(
            "Unsupported URL scheme '{}' in {}",
            other, base
        ))),
    }
}

/// Join an endpoint path onto a base URL, keeping any path prefix of the base.
pub fn endpoint(base: &Url, path: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|e| KlippError::Config(format!("Invalid endpoint '{}': {}", path, e)))
}
