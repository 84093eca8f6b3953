//! Configuration module for Klipp.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{GenerationPrompts, Prompts};
pub use settings::{
    EmbeddingSettings, GeneralSettings, GenerationProvider, GenerationSettings, PreviewQuality,
    PreviewSettings, ProcessingSettings, PromptSettings, RetrievalSettings, SegmentationSettings,
    ServerSettings, Settings, TranscriptionSettings, VectorStoreSettings,
};
