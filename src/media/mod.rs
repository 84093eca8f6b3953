//! Media processing utilities.
//!
//! Thin wrappers around the `ffmpeg` and `ffprobe` binaries: probing a source
//! video, cutting clips, extracting clip audio.

mod ffmpeg;
mod probe;

pub use ffmpeg::{extract_clip_audio, extract_clip_video, run_tool};
pub use probe::{parse_probe_output, probe_video, VideoProbe};

/// Format seconds as MM:SS or HH:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
