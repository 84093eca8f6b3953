//! Configuration settings for Klipp.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub segmentation: SegmentationSettings,
    pub embedding: EmbeddingSettings,
    pub transcription: TranscriptionSettings,
    pub generation: GenerationSettings,
    pub retrieval: RetrievalSettings,
    pub processing: ProcessingSettings,
    pub preview: PreviewSettings,
    pub server: ServerSettings,
    pub vector_store: VectorStoreSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing clips, previews and uploads.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.klipp".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Video segmentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationSettings {
    /// Segmentation strategy (fixed, scene).
    pub strategy: String,
    /// Length of each clip in seconds (upper bound for scene clips).
    pub clip_duration_seconds: u32,
    /// Shortest scene clip in seconds.
    pub min_clip_seconds: u32,
    /// Scene change score (0.0-1.0) that starts a new scene clip.
    pub scene_threshold: f32,
    /// Target clip width in pixels.
    pub width: u32,
    /// Target clip height in pixels.
    pub height: u32,
    /// Accepted container extensions (lowercase, without dot).
    pub supported_formats: Vec<String>,
}

impl Default for SegmentationSettings {
    fn default() -> Self {
        Self {
            strategy: "fixed".to_string(),
            clip_duration_seconds: 30,
            min_clip_seconds: 5,
            scene_threshold: 0.4,
            width: 640,
            height: 360,
            supported_formats: ["mp4", "avi", "mov", "mkv"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Multimodal embedding service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Base URL of the embedding service.
    pub base_url: String,
    /// Embedding dimensions produced by the service.
    pub dimensions: u32,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            dimensions: 1024,
            timeout_seconds: 300,
        }
    }
}

/// Transcription service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Transcribe clip audio during ingestion.
    pub enabled: bool,
    /// Base URL of an OpenAI-compatible API. None uses the OpenAI default.
    pub base_url: Option<String>,
    /// Transcription model.
    pub model: String,
    /// Language hint (ISO-639-1), if any.
    pub language: Option<String>,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            model: "whisper-1".to_string(),
            language: None,
        }
    }
}

/// LLM backend used for answer generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    /// Local Ollama runtime.
    #[default]
    Ollama,
    /// OpenAI-compatible chat completions.
    OpenAI,
}

impl std::str::FromStr for GenerationProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" | "local" => Ok(GenerationProvider::Ollama),
            "openai" => Ok(GenerationProvider::OpenAI),
            _ => Err(format!("Unknown generation provider: {}", s)),
        }
    }
}

impl std::fmt::Display for GenerationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationProvider::Ollama => write!(f, "ollama"),
            GenerationProvider::OpenAI => write!(f, "openai"),
        }
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Generation backend.
    pub provider: GenerationProvider,
    /// Base URL of the backend. None uses the provider default.
    pub base_url: Option<String>,
    /// Model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: GenerationProvider::Ollama,
            base_url: None,
            model: "qwen3:0.6b".to_string(),
            temperature: 0.7,
            timeout_seconds: 120,
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of clips to retrieve per query.
    pub top_k: usize,
    /// Minimum cosine similarity for a clip to be returned.
    pub min_score: f32,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_score: 0.0,
        }
    }
}

/// Ingestion processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    /// Maximum clips whose features are extracted at once (1 = sequential).
    pub max_concurrent_clips: usize,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            max_concurrent_clips: 1,
        }
    }
}

/// GIF rendering quality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PreviewQuality {
    Low,
    #[default]
    Medium,
    High,
}

/// GIF preview settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewSettings {
    /// Render previews for retrieved clips.
    pub enabled: bool,
    /// Frames per second.
    pub fps: u32,
    /// Width in pixels (height keeps aspect ratio).
    pub width: u32,
    /// Rendering quality.
    pub quality: PreviewQuality,
    /// Longest preview in seconds.
    pub max_duration_seconds: f64,
    /// Maximum previews rendered per query.
    pub max_previews: usize,
    /// Previews older than this are removed by cleanup.
    pub max_age_hours: u64,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            fps: 10,
            width: 320,
            quality: PreviewQuality::Medium,
            max_duration_seconds: 10.0,
            max_previews: 3,
            max_age_hours: 24,
        }
    }
}

/// Web server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Largest accepted upload in megabytes.
    pub max_upload_mb: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7860,
            max_upload_mb: 2048,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Path to the SQLite database (default: `<data_dir>/index.db`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<String>,
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            settings.validate()?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::KlippError;

        if self.segmentation.clip_duration_seconds == 0 {
            return Err(KlippError::Config(
                "segmentation.clip_duration_seconds must be greater than 0".to_string(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(KlippError::Config(
                "embedding.dimensions must be greater than 0".to_string(),
            ));
        }
        if self.processing.max_concurrent_clips == 0 {
            return Err(KlippError::Config(
                "processing.max_concurrent_clips must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::KlippError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("klipp")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Directory holding the re-encoded clip videos.
    pub fn clip_video_dir(&self) -> PathBuf {
        self.data_dir().join("clips").join("video")
    }

    /// Directory holding the extracted clip audio.
    pub fn clip_audio_dir(&self) -> PathBuf {
        self.data_dir().join("clips").join("audio")
    }

    /// Directory holding rendered GIF previews.
    pub fn preview_dir(&self) -> PathBuf {
        self.data_dir().join("previews")
    }

    /// Directory holding videos uploaded through the web UI.
    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir().join("uploads")
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        match &self.vector_store.sqlite_path {
            Some(path) => Self::expand_path(path),
            None => self.data_dir().join("index.db"),
        }
    }
}
