//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    match orchestrator.vector_store().list_videos().await {
        Ok(videos) => {
            if videos.is_empty() {
                Output::info("No videos indexed yet. Use 'klipp ingest <file>' to add one.");
            } else {
                Output::header(&format!("Indexed Videos ({})", videos.len()));
                println!();

                for video in &videos {
                    Output::video_info(
                        &video.title,
                        &video.video_id,
                        video.clip_count,
                        video.duration_seconds,
                        video.has_audio,
                    );
                }

                let total_clips: u32 = videos.iter().map(|v| v.clip_count).sum();
                println!();
                Output::kv("Total videos", &videos.len().to_string());
                Output::kv("Total clips", &total_clips.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list videos: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
