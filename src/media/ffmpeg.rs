//! Clip extraction with ffmpeg.

use crate::error::{KlippError, Result};
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Run an external media tool, returning its stdout.
///
/// A missing binary maps to [`KlippError::ToolNotFound`], a non-zero exit to
/// [`KlippError::ToolFailed`] carrying the tool's stderr.
pub async fn run_tool<I, S>(tool: &str, args: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let result = Command::new(tool)
        .args(args)
        .kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(KlippError::ToolNotFound(tool.to_string()));
        }
        Err(e) => {
            return Err(KlippError::ToolFailed(format!("{} execution failed: {e}", tool)));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(KlippError::ToolFailed(format!(
            "{} exited with {}: {}",
            tool,
            output.status,
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}

/// Cut `[start, end)` out of `source` as a re-encoded, scaled, silent clip.
#[instrument(skip_all, fields(start = start, end = end))]
pub async fn extract_clip_video(
    source: &Path,
    dest: &Path,
    start: f64,
    end: f64,
    width: u32,
    height: u32,
) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let scale = format!("scale={}:{},format=yuv420p", width, height);
    let args: Vec<OsString> = vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-ss".into(),
        format_seconds(start).into(),
        "-to".into(),
        format_seconds(end).into(),
        "-i".into(),
        source.as_os_str().to_owned(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "veryfast".into(),
        "-crf".into(),
        "28".into(),
        "-tune".into(),
        "fastdecode".into(),
        "-movflags".into(),
        "+faststart".into(),
        "-vf".into(),
        scale.into(),
        "-an".into(),
        dest.as_os_str().to_owned(),
    ];

    run_tool("ffmpeg", args).await?;
    debug!("Created video clip {:?}", dest);
    Ok(())
}

/// Extract `[start, end)` of the source audio as mono 16 kHz PCM WAV.
#[instrument(skip_all, fields(start = start, end = end))]
pub async fn extract_clip_audio(source: &Path, dest: &Path, start: f64, end: f64) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let args: Vec<OsString> = vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-ss".into(),
        format_seconds(start).into(),
        "-to".into(),
        format_seconds(end).into(),
        "-i".into(),
        source.as_os_str().to_owned(),
        "-vn".into(),
        "-ac".into(),
        "1".into(),
        "-ar".into(),
        "16000".into(),
        "-c:a".into(),
        "pcm_s16le".into(),
        dest.as_os_str().to_owned(),
    ];

    run_tool("ffmpeg", args).await?;
    debug!("Created audio clip {:?}", dest);
    Ok(())
}

fn format_seconds(seconds: f64) -> String {
    format!("{:.3}", seconds)
}
