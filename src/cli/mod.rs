//! CLI module for Klipp.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Klipp - Question answering over your videos
///
/// A local-first CLI tool that cuts videos into clips, indexes their multimodal
/// embeddings, and answers questions from the most relevant clips.
/// The name "Klipp" is the Norwegian word for "cut."
#[derive(Parser, Debug)]
#[command(name = "klipp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check system requirements and configuration
    Doctor,

    /// Segment, embed, and index a local video file
    Ingest {
        /// Path to a video file (mp4, avi, mov, mkv)
        input: String,

        /// Force re-processing even if already indexed
        #[arg(short, long)]
        force: bool,
    },

    /// Ask a question and get an answer from your video library
    Ask {
        /// The question to ask
        question: String,

        /// Restrict retrieval to one video ID
        #[arg(long)]
        video: Option<String>,

        /// LLM model to use for answer generation
        #[arg(short, long)]
        model: Option<String>,

        /// Number of clips to retrieve as context
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Search for relevant clips
    Search {
        /// Search query
        query: String,

        /// Restrict the search to one video ID
        #[arg(long)]
        video: Option<String>,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Minimum similarity score (-1.0 to 1.0)
        #[arg(short, long, default_value = "0.0", allow_hyphen_values = true)]
        min_score: f32,
    },

    /// List indexed videos
    List,

    /// Remove an indexed video and its clip files
    Remove {
        /// Video ID to remove
        video_id: String,
    },

    /// Start the web UI and HTTP API
    Serve {
        /// Host to bind to (default: server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (default: server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage rendered GIF previews
    Previews {
        #[command(subcommand)]
        action: PreviewsAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum PreviewsAction {
    /// Delete old previews
    Clean {
        /// Remove previews older than this many hours (default: preview.max_age_hours)
        #[arg(long)]
        max_age_hours: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
