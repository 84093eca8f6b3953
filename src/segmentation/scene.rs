//! Scene change detection with ffmpeg's `scene` score.

use crate::error::Result;
use crate::media::run_tool;
use regex::Regex;
use std::ffi::OsString;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, instrument};

/// Detect scene changes in `source`, returning cut times in seconds.
#[instrument(skip_all, fields(threshold = threshold))]
pub async fn detect_scene_changes(source: &Path, threshold: f32) -> Result<Vec<f64>> {
    let filter = format!(
        "select='gt(scene,{:.3})',metadata=print:file=-",
        threshold.clamp(0.0, 1.0)
    );
    let args: Vec<OsString> = vec![
        "-hide_banner".into(),
        "-nostats".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        source.as_os_str().to_owned(),
        "-vf".into(),
        filter.into(),
        "-an".into(),
        "-f".into(),
        "null".into(),
        "-".into(),
    ];

    let stdout = run_tool("ffmpeg", args).await?;
    let cuts = parse_scene_times(&String::from_utf8_lossy(&stdout));
    debug!("Detected {} scene changes", cuts.len());
    Ok(cuts)
}

/// Extract `pts_time` values from ffmpeg `metadata=print` output.
pub fn parse_scene_times(output: &str) -> Vec<f64> {
    static PTS_TIME: OnceLock<Regex> = OnceLock::new();
    let re = PTS_TIME.get_or_init(|| Regex::new(r"pts_time:(\d+(?:\.\d+)?)").expect("valid regex"));

    re.captures_iter(output)
        .filter_map(|c| c.get(1))
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .collect()
}
