//! Klipp CLI entry point.

use anyhow::Result;
use clap::Parser;
use klipp::cli::{commands, Cli, Commands};
use klipp::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.as_ref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Verbosity flags win over the configured level
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("klipp={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    std::fs::create_dir_all(settings.data_dir())?;

    match &cli.command {
        Commands::Doctor => {
            commands::run_doctor(&settings).await?;
        }

        Commands::Ingest { input, force } => {
            commands::run_ingest(input, *force, settings).await?;
        }

        Commands::Ask {
            question,
            video,
            model,
            top_k,
        } => {
            commands::run_ask(question, video.as_deref(), model.clone(), *top_k, settings).await?;
        }

        Commands::Search {
            query,
            video,
            limit,
            min_score,
        } => {
            commands::run_search(query, video.as_deref(), *limit, *min_score, settings).await?;
        }

        Commands::List => {
            commands::run_list(settings).await?;
        }

        Commands::Remove { video_id } => {
            commands::run_remove(video_id, settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host.clone(), *port, settings).await?;
        }

        Commands::Previews { action } => {
            commands::run_previews(action, &settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, config_path, settings)?;
        }
    }

    Ok(())
}
