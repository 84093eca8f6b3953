//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting operations that would otherwise fail midway.

use crate::config::{GenerationProvider, Settings};
use crate::error::{KlippError, Result};
use crate::transcription::is_api_key_configured;
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion requires ffmpeg, ffprobe, and credentials for transcription.
    Ingest,
    /// Asking questions requires credentials for the generation backend.
    Ask,
    /// Search requires only the index and the embedding service.
    Search,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ingest => {
            check_tool("ffmpeg")?;
            check_tool("ffprobe")?;
            if settings.transcription.enabled && settings.transcription.base_url.is_none() {
                check_api_key("transcription")?;
            }
        }
        Operation::Ask => {
            if settings.generation.provider == GenerationProvider::OpenAI
                && settings.generation.base_url.is_none()
            {
                check_api_key("generation")?;
            }
        }
        Operation::Search => {
            // No external requirements beyond the embedding service
        }
    }
    Ok(())
}

/// Check if OpenAI API key is configured for a hosted endpoint.
fn check_api_key(purpose: &str) -> Result<()> {
    if is_api_key_configured() {
        Ok(())
    } else {
        Err(KlippError::Config(format!(
            "OPENAI_API_KEY not set but {} uses the OpenAI API. \
             Set it with: export OPENAI_API_KEY='sk-...' or configure a base_url",
            purpose
        )))
    }
}

/// Check if an external tool is available.
pub fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("-version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(KlippError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(KlippError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(KlippError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
