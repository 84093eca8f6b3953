//! Source video handling.
//!
//! Validates local video files and derives their stable identity.

use crate::error::{KlippError, Result};
use crate::media::{probe_video, VideoProbe};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// A validated source video ready for segmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSource {
    /// Stable identifier derived from the file name.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Absolute path to the file.
    pub path: PathBuf,
    /// Duration in seconds.
    pub duration_seconds: f64,
    /// Whether the file has an audio stream.
    pub has_audio: bool,
}

impl VideoSource {
    /// Validate `input` as a supported local video and probe it.
    pub async fn open(input: &str, supported_formats: &[String]) -> Result<Self> {
        let path = check_file(Path::new(input), supported_formats)?;
        let probe = probe_video(&path).await?;
        Ok(Self::from_probe(path, probe))
    }

    /// Build a source from an already validated path and its probe.
    ///
    /// The title is the file stem; container metadata is ignored.
    pub fn from_probe(path: PathBuf, probe: VideoProbe) -> Self {
        let id = video_id_for(&path);
        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown")
            .to_string();

        Self {
            id,
            title,
            path,
            duration_seconds: probe.duration_seconds,
            has_audio: probe.has_audio,
        }
    }

    /// Stem used when naming clip files.
    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(sanitize)
            .unwrap_or_else(|| self.id.clone())
    }
}

/// Check that `path` is an existing file with a supported extension.
///
/// Returns the canonical path.
pub fn check_file(path: &Path, supported_formats: &[String]) -> Result<PathBuf> {
    if !path.exists() {
        return Err(KlippError::VideoNotFound(format!(
            "File not found: {}",
            path.display()
        )));
    }

    if !path.is_file() {
        return Err(KlippError::InvalidInput(format!(
            "Not a file: {}",
            path.display()
        )));
    }

    if !is_supported(path, supported_formats) {
        return Err(KlippError::InvalidInput(format!(
            "Unsupported video format: {}. Supported: {}",
            path.display(),
            supported_formats.join(", ")
        )));
    }

    Ok(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()))
}

/// Check if the extension of `path` is one of `supported_formats`.
pub fn is_supported(path: &Path, supported_formats: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            supported_formats
                .iter()
                .any(|f| f.trim_start_matches('.').eq_ignore_ascii_case(&ext))
        })
        .unwrap_or(false)
}

/// Derive the video id from the file name.
///
/// The same file uploaded twice keeps the same id, wherever it lands.
pub fn video_id_for(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(sanitize)
        .unwrap_or_else(|| "video".to_string())
}

/// Replace characters that are unsafe in file names and URLs with `_`.
pub fn sanitize(name: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("valid regex"));

    let cleaned = re.replace_all(name.trim(), "_");
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "video".to_string()
    } else {
        cleaned.to_string()
    }
}
