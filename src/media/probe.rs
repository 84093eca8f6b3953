//! Source video probing with ffprobe.

use super::ffmpeg::run_tool;
use crate::error::{KlippError, Result};
use serde::Deserialize;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{debug, instrument};

/// What ffprobe reports about a source video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoProbe {
    /// Duration in seconds.
    pub duration_seconds: f64,
    /// Whether the container has at least one audio stream.
    pub has_audio: bool,
    /// Width of the first video stream.
    pub width: Option<u32>,
    /// Height of the first video stream.
    pub height: Option<u32>,
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    duration: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Probe a video file for duration and streams.
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn probe_video(path: &Path) -> Result<VideoProbe> {
    let stdout = run_tool(
        "ffprobe",
        [
            OsStr::new("-v"),
            OsStr::new("quiet"),
            OsStr::new("-print_format"),
            OsStr::new("json"),
            OsStr::new("-show_format"),
            OsStr::new("-show_streams"),
            path.as_os_str(),
        ],
    )
    .await?;

    let probe = parse_probe_output(&String::from_utf8_lossy(&stdout))?;
    debug!(
        "Probed video: {:.2}s, audio: {}",
        probe.duration_seconds, probe.has_audio
    );
    Ok(probe)
}

/// Parse the JSON printed by `ffprobe -show_format -show_streams`.
///
/// The video stream's duration wins over the container's; a file without a
/// video stream is rejected.
pub fn parse_probe_output(json: &str) -> Result<VideoProbe> {
    let parsed: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| KlippError::ToolFailed(format!("Invalid ffprobe output: {}", e)))?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| KlippError::InvalidInput("No video stream found".to_string()))?;

    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let duration_seconds = video
        .duration
        .as_deref()
        .and_then(parse_duration)
        .or_else(|| {
            parsed
                .format
                .as_ref()
                .and_then(|f| f.duration.as_deref())
                .and_then(parse_duration)
        })
        .ok_or_else(|| KlippError::ToolFailed("Could not determine video duration".to_string()))?;

    Ok(VideoProbe {
        duration_seconds,
        has_audio,
        width: video.width,
        height: video.height,
    })
}

fn parse_duration(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|d| d.is_finite() && *d >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_with_audio() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "duration": "65.500000", "width": 1920, "height": 1080},
                {"codec_type": "audio", "duration": "65.400000"}
            ],
            "format": {"duration": "65.520000", "tags": {"title": "Lecture"}}
        }"#;

        let probe = parse_probe_output(json).unwrap();
        assert!((probe.duration_seconds - 65.5).abs() < 1e-9);
        assert!(probe.has_audio);
        assert_eq!(probe.width, Some(1920));
        assert_eq!(probe.height, Some(1080));
    }

    #[test]
    fn test_parse_probe_falls_back_to_format_duration() {
        let json = r#"{
            "streams": [{"codec_type": "video"}],
            "format": {"duration": "12.0"}
        }"#;

        let probe = parse_probe_output(json).unwrap();
        assert!((probe.duration_seconds - 12.0).abs() < 1e-9);
        assert!(!probe.has_audio);
        assert_eq!(probe.width, None);
    }

    #[test]
    fn test_parse_probe_requires_video_stream() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "3.0"}}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(KlippError::InvalidInput(_))
        ));
    }
}
