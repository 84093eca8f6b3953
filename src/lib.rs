//! Klipp - Question answering over video clips
//!
//! A local-first CLI tool and web UI that cuts videos into clips, indexes
//! their multimodal embeddings, and answers questions from the clips most
//! relevant to them.
//!
//! The name "Klipp" is the Norwegian word for "cut."
//!
//! # Overview
//!
//! Klipp allows you to:
//! - Segment local videos into fixed-length or scene-based clips
//! - Embed each clip (video, audio and optional transcript) into one vector
//! - Search clips semantically and ask questions with cited sources
//! - Preview the supporting clips as animated GIFs
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management and prompt templates
//! - `media` - ffmpeg and ffprobe plumbing
//! - `source` - Local video sources and video ids
//! - `segmentation` - Clip planning and cutting
//! - `embedding` - Multimodal embedding service client
//! - `transcription` - Optional speech-to-text for clip audio
//! - `vector_store` - Vector index of videos and clips
//! - `generation` - Answer generation backends (Ollama, OpenAI-compatible)
//! - `rag` - Context building and question answering
//! - `preview` - Animated GIF previews of retrieved clips
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use klipp::config::Settings;
//! use klipp::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let result = orchestrator.process_video("talk.mp4", false, None).await?;
//!     println!("Indexed {} clips", result.clips_indexed);
//!
//!     let answer = orchestrator.ask("What is on the whiteboard?", None, None).await?;
//!     println!("{}", answer.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod http;
pub mod media;
pub mod orchestrator;
pub mod preview;
pub mod rag;
pub mod segmentation;
pub mod source;
pub mod transcription;
pub mod vector_store;

pub use error::{KlippError, Result};
