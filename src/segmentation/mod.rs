//! Video segmentation into clips.
//!
//! A clip is the unit of retrieval. Clips are planned either on a fixed grid or
//! along detected scene changes, then cut into their own files.

mod plan;
mod scene;
mod segmenter;

pub use plan::{plan_fixed_clips, plan_scene_clips};
pub use scene::{detect_scene_changes, parse_scene_times};
pub use segmenter::{remove_clip_files, VideoSegmenter};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A planned time range of a source video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipSpan {
    /// Position of this clip within the video.
    pub order: i32,
    /// Start time in seconds.
    pub start_seconds: f64,
    /// End time in seconds.
    pub end_seconds: f64,
}

impl ClipSpan {
    pub fn new(order: i32, start_seconds: f64, end_seconds: f64) -> Self {
        Self {
            order,
            start_seconds,
            end_seconds,
        }
    }

    /// Duration of this clip in seconds.
    pub fn duration(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }

    /// File stem for this clip's files: `<source stem>_<start>_<end>`.
    pub fn file_stem(&self, source_stem: &str) -> String {
        format!(
            "{}_{:.1}_{:.1}",
            source_stem, self.start_seconds, self.end_seconds
        )
    }
}

/// A clip cut to disk.
#[derive(Debug, Clone)]
pub struct ClipFiles {
    pub span: ClipSpan,
    /// Re-encoded video (no audio track).
    pub video_path: PathBuf,
    /// Mono 16 kHz WAV, when the source has audio.
    pub audio_path: Option<PathBuf>,
}

/// Segmentation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentationStrategy {
    /// Fixed-length clips.
    Fixed,
    /// Clips bounded by scene changes.
    Scene,
}

impl std::str::FromStr for SegmentationStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" | "temporal" => Ok(SegmentationStrategy::Fixed),
            "scene" => Ok(SegmentationStrategy::Scene),
            _ => Err(format!("Unknown segmentation strategy: {}", s)),
        }
    }
}

/// Configuration for planning clips.
#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    pub strategy: SegmentationStrategy,
    /// Fixed clip length; longest scene clip.
    pub clip_seconds: f64,
    /// Shortest scene clip.
    pub min_clip_seconds: f64,
    /// Scene change score threshold.
    pub scene_threshold: f32,
    /// Output width.
    pub width: u32,
    /// Output height.
    pub height: u32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            strategy: SegmentationStrategy::Fixed,
            clip_seconds: 30.0,
            min_clip_seconds: 5.0,
            scene_threshold: 0.4,
            width: 640,
            height: 360,
        }
    }
}

impl From<&crate::config::SegmentationSettings> for SegmentationConfig {
    fn from(settings: &crate::config::SegmentationSettings) -> Self {
        Self {
            strategy: settings
                .strategy
                .parse()
                .unwrap_or(SegmentationStrategy::Fixed),
            clip_seconds: settings.clip_duration_seconds as f64,
            min_clip_seconds: settings.min_clip_seconds as f64,
            scene_threshold: settings.scene_threshold,
            width: settings.width,
            height: settings.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_file_stem() {
        let span = ClipSpan::new(2, 60.0, 65.5);
        assert_eq!(span.file_stem("talk"), "talk_60.0_65.5");
        assert!((span.duration() - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_strategy_from_settings() {
        let mut settings = crate::config::SegmentationSettings::default();
        settings.strategy = "scene".to_string();
        let config = SegmentationConfig::from(&settings);
        assert_eq!(config.strategy, SegmentationStrategy::Scene);
        assert_eq!(config.clip_seconds, 30.0);

        settings.strategy = "nonsense".to_string();
        assert_eq!(SegmentationConfig::from(&settings).strategy, SegmentationStrategy::Fixed);
    }
}
