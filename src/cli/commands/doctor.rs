//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::{GenerationProvider, Settings};
use crate::embedding::HttpEmbedder;
use crate::generation::OllamaGenerator;
use crate::transcription::is_api_key_configured;
use console::style;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

fn print_section(title: &str, results: &[CheckResult]) {
    println!("{}", style(title).bold());
    for check in results {
        check.print();
    }
    println!();
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Klipp Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    let tools = vec![
        check_tool("ffmpeg", install_hint_ffmpeg()),
        check_tool("ffprobe", install_hint_ffmpeg()),
    ];
    print_section("External Tools", &tools);
    checks.extend(tools);

    let services = vec![
        check_embedding_service(settings).await,
        check_generation_backend(settings).await,
        check_transcription(settings),
    ];
    print_section("Services", &services);
    checks.extend(services);

    let dirs = check_directories(settings);
    print_section("Directories", &dirs);
    checks.extend(dirs);

    let config = vec![check_config_file()];
    print_section("Configuration", &config);
    checks.extend(config);

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Klipp.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Klipp is ready to use.");
    }

    Ok(())
}

/// Check if an external tool is available.
fn check_tool(name: &str, hint: &str) -> CheckResult {
    match Command::new(name).arg("-version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();

            let version_display = if version.chars().count() > 50 {
                format!("{}...", version.chars().take(50).collect::<String>())
            } else {
                version
            };

            CheckResult::ok(name, &version_display)
        }
        Ok(_) => CheckResult::error(name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", hint)
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), hint),
    }
}

/// Check that the embedding service answers its health endpoint.
async fn check_embedding_service(settings: &Settings) -> CheckResult {
    let name = "Embedding service";
    let embedder = match HttpEmbedder::from_settings(&settings.embedding) {
        Ok(embedder) => embedder,
        Err(e) => {
            return CheckResult::error(name, &e.to_string(), "Fix embedding.base_url in the config")
        }
    };

    if embedder.health().await {
        CheckResult::ok(
            name,
            &format!(
                "{} ({} dimensions)",
                embedder.base_url(),
                settings.embedding.dimensions
            ),
        )
    } else {
        CheckResult::error(
            name,
            &format!("{} not reachable", embedder.base_url()),
            "Start the embedding service or set embedding.base_url",
        )
    }
}

/// Check the configured generation backend.
async fn check_generation_backend(settings: &Settings) -> CheckResult {
    let name = "Generation";
    let model = &settings.generation.model;

    match settings.generation.provider {
        GenerationProvider::Ollama => match OllamaGenerator::from_settings(&settings.generation) {
            Ok(ollama) => match ollama.health().await {
                Ok(true) => CheckResult::ok(name, &format!("Ollama with {}", model)),
                Ok(false) => CheckResult::warning(
                    name,
                    &format!("Ollama is running but {} is not pulled", model),
                    &format!("Pull it with: ollama pull {}", model),
                ),
                Err(_) => CheckResult::error(
                    name,
                    "Ollama not reachable",
                    "Start it with: ollama serve (or set generation.base_url)",
                ),
            },
            Err(e) => CheckResult::error(name, &e.to_string(), "Fix generation.base_url in the config"),
        },
        GenerationProvider::OpenAI => {
            if let Some(base) = &settings.generation.base_url {
                CheckResult::ok(name, &format!("{} at {}", model, base))
            } else if is_api_key_configured() {
                CheckResult::ok(name, &format!("OpenAI with {}", model))
            } else {
                CheckResult::error(
                    name,
                    "OPENAI_API_KEY not set",
                    "Set with: export OPENAI_API_KEY='sk-...' or configure generation.base_url",
                )
            }
        }
    }
}

/// Check the transcription configuration.
fn check_transcription(settings: &Settings) -> CheckResult {
    let name = "Transcription";
    let transcription = &settings.transcription;

    if !transcription.enabled {
        return CheckResult::ok(name, "disabled");
    }

    match &transcription.base_url {
        Some(base) => CheckResult::ok(name, &format!("{} at {}", transcription.model, base)),
        None if is_api_key_configured() => {
            CheckResult::ok(name, &format!("OpenAI with {}", transcription.model))
        }
        None => CheckResult::error(
            name,
            "enabled but OPENAI_API_KEY not set",
            "Set OPENAI_API_KEY, configure transcription.base_url, or disable transcription",
        ),
    }
}

/// Check data directories.
fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let data_dir = settings.data_dir();
    if data_dir.exists() {
        results.push(CheckResult::ok(
            "Data directory",
            &format!("{}", data_dir.display()),
        ));
    } else {
        results.push(CheckResult::warning(
            "Data directory",
            &format!("{} (will be created)", data_dir.display()),
            "Directory will be created on first use",
        ));
    }

    let db_path = settings.sqlite_path();
    if db_path.exists() {
        let size = std::fs::metadata(&db_path)
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "unknown size".to_string());
        results.push(CheckResult::ok(
            "Database",
            &format!("{} ({})", db_path.display(), size),
        ));
    } else {
        results.push(CheckResult::warning(
            "Database",
            &format!("{} (not created yet)", db_path.display()),
            "Database will be created on first ingestion",
        ));
    }

    results
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: klipp config edit",
        )
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Platform-specific install hint for ffmpeg.
fn install_hint_ffmpeg() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install ffmpeg"
    } else if cfg!(target_os = "linux") {
        "Install with: sudo apt install ffmpeg (or your package manager)"
    } else {
        "Install from: https://ffmpeg.org/download.html"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }

    #[test]
    fn test_transcription_disabled_is_ok() {
        let result = check_transcription(&Settings::default());
        assert_eq!(result.status, CheckStatus::Ok);
        assert_eq!(result.message, "disabled");
    }

    #[test]
    fn test_transcription_with_local_server() {
        let mut settings = Settings::default();
        settings.transcription.enabled = true;
        settings.transcription.base_url = Some("http://127.0.0.1:9000/v1".to_string());
        assert_eq!(check_transcription(&settings).status, CheckStatus::Ok);
    }

    #[tokio::test]
    async fn test_unreachable_embedding_service() {
        let mut settings = Settings::default();
        settings.embedding.base_url = "http://127.0.0.1:9".to_string();
        settings.embedding.timeout_seconds = 2;
        let result = check_embedding_service(&settings).await;
        assert_eq!(result.status, CheckStatus::Error);
    }
}
