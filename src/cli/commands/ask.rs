//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::preview::preview_info;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    video: Option<&str>,
    model: Option<String>,
    top_k: Option<usize>,
    mut settings: Settings,
) -> Result<()> {
    if let Some(model) = model {
        settings.generation.model = model;
    }

    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'klipp doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Searching clips...");
    let result = orchestrator.ask(question, video, top_k).await;
    spinner.finish_and_clear();

    match result {
        Ok(answer) => {
            println!("\n{}\n", answer.answer);

            if !answer.sources.is_empty() {
                Output::header("Sources");
                for source in &answer.sources {
                    Output::clip_result(
                        &source.video_title,
                        &source.timestamp,
                        source.score,
                        &source.visual_description,
                        source.transcript.as_deref(),
                        &source.clip_path,
                    );
                }
            }

            if !answer.previews.is_empty() {
                println!();
                Output::header("Previews");
                for preview in &answer.previews {
                    let path = preview.preview_path.display().to_string();
                    match preview_info(&preview.preview_path).await {
                        Ok(Some(info)) => {
                            Output::list_item(&format!("{} ({:.2} MB)", path, info.file_size_mb))
                        }
                        _ => Output::list_item(&path),
                    }
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
