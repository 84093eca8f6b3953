//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the ingest command.
pub async fn run_ingest(input: &str, force: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'klipp doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    Output::info(&format!("Processing: {}", input));

    let orchestrator = Orchestrator::new(settings)?;

    let pb = Output::progress_bar(0, "Extracting clips");
    let report = |done: usize, total: usize| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    };

    let result = orchestrator.process_video(input, force, Some(&report)).await;
    pb.finish_and_clear();

    match result {
        Ok(result) if result.skipped => {
            Output::warning(&format!(
                "'{}' is already indexed. Use --force to reprocess.",
                result.title
            ));
        }
        Ok(result) => {
            Output::success(&format!(
                "Indexed '{}' ({}/{} clips)",
                result.title, result.clips_indexed, result.clips_total
            ));
            Output::kv("Video ID", &result.video_id);
            if result.clips_indexed < result.clips_total {
                Output::warning(&format!(
                    "{} clips were skipped, run with -v for details",
                    result.clips_total - result.clips_indexed
                ));
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to process: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
