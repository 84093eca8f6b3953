//! Remove command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the remove command.
pub async fn run_remove(video_id: &str, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    match orchestrator.remove_video(video_id).await {
        Ok(result) => {
            Output::success(&format!(
                "Removed '{}' ({} clips, {} files)",
                video_id, result.clips_removed, result.files_removed
            ));
        }
        Err(e) => {
            Output::error(&format!("Failed to remove: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
