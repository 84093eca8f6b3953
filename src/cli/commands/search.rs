//! Search command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::ContextClip;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    video: Option<&str>,
    limit: usize,
    min_score: f32,
    settings: Settings,
) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Searching...");
    let results = orchestrator.search(query, video, limit, min_score).await;
    spinner.finish_and_clear();

    match results {
        Ok(results) if results.is_empty() => {
            Output::warning("No clips found matching your query.");
        }
        Ok(results) => {
            Output::success(&format!("Found {} clips", results.len()));

            for clip in results.into_iter().map(ContextClip::from) {
                Output::clip_result(
                    &clip.video_title,
                    &clip.timestamp,
                    clip.score,
                    &clip.visual_description,
                    clip.transcript.as_deref(),
                    &clip.clip_path,
                );
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
