//! Previews command implementation.

use crate::cli::{Output, PreviewsAction};
use crate::config::Settings;
use crate::preview::cleanup_old_previews;
use anyhow::Result;
use std::time::Duration;

/// Run the previews command.
pub fn run_previews(action: &PreviewsAction, settings: &Settings) -> Result<()> {
    match action {
        PreviewsAction::Clean { max_age_hours } => {
            let hours = max_age_hours.unwrap_or(settings.preview.max_age_hours);
            let dir = settings.preview_dir();

            let removed = cleanup_old_previews(&dir, Duration::from_secs(hours * 3600))?;
            if removed == 0 {
                Output::info(&format!("No previews older than {} hours", hours));
            } else {
                Output::success(&format!(
                    "Removed {} previews from {}",
                    removed,
                    dir.display()
                ));
            }
        }
    }

    Ok(())
}
