//! Materializes planned clips as files.

use super::{
    detect_scene_changes, plan_fixed_clips, plan_scene_clips, ClipFiles, ClipSpan,
    SegmentationConfig, SegmentationStrategy,
};
use crate::error::{KlippError, Result};
use crate::media::{extract_clip_audio, extract_clip_video};
use crate::source::VideoSource;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Cuts a source video into clip files.
pub struct VideoSegmenter {
    config: SegmentationConfig,
    video_dir: PathBuf,
    audio_dir: PathBuf,
}

impl VideoSegmenter {
    /// Create a segmenter writing clips under the given directories.
    pub fn new(config: SegmentationConfig, video_dir: PathBuf, audio_dir: PathBuf) -> Self {
        Self {
            config,
            video_dir,
            audio_dir,
        }
    }

    /// Plan the clip boundaries for `source`.
    pub async fn plan(&self, source: &VideoSource) -> Result<Vec<ClipSpan>> {
        let spans = match self.config.strategy {
            SegmentationStrategy::Fixed => {
                plan_fixed_clips(source.duration_seconds, self.config.clip_seconds)
            }
            SegmentationStrategy::Scene => {
                match detect_scene_changes(&source.path, self.config.scene_threshold).await {
                    Ok(cuts) => plan_scene_clips(
                        source.duration_seconds,
                        &cuts,
                        self.config.min_clip_seconds,
                        self.config.clip_seconds,
                    ),
                    Err(e) => {
                        warn!("Scene detection failed, using fixed clips: {}", e);
                        plan_fixed_clips(source.duration_seconds, self.config.clip_seconds)
                    }
                }
            }
        };

        if spans.is_empty() {
            return Err(KlippError::InvalidInput(format!(
                "Video '{}' is too short to segment ({:.2}s)",
                source.title, source.duration_seconds
            )));
        }

        info!(
            "Video duration: {:.2}s, planned {} clips",
            source.duration_seconds,
            spans.len()
        );
        Ok(spans)
    }

    /// Video and audio file paths for one clip.
    ///
    /// Each video gets its own directory named after its id, so sources that
    /// share a file stem never share clip files.
    pub fn clip_paths(&self, source: &VideoSource, span: &ClipSpan) -> (PathBuf, PathBuf) {
        let stem = span.file_stem(&source.file_stem());
        (
            self.video_dir.join(&source.id).join(format!("{}.mp4", stem)),
            self.audio_dir.join(&source.id).join(format!("{}.wav", stem)),
        )
    }

    /// Remove the per-video clip directories of `video_id` if they are empty.
    pub fn remove_video_dirs(&self, video_id: &str) {
        for dir in [self.video_dir.join(video_id), self.audio_dir.join(video_id)] {
            match std::fs::remove_dir(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove {:?}: {}", dir, e),
            }
        }
    }

    /// Cut a single planned clip to disk.
    #[instrument(skip(self, source), fields(order = span.order))]
    pub async fn cut(&self, source: &VideoSource, span: ClipSpan) -> Result<ClipFiles> {
        let (video_path, wav_path) = self.clip_paths(source, &span);
        if let Some(parent) = video_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        extract_clip_video(
            &source.path,
            &video_path,
            span.start_seconds,
            span.end_seconds,
            self.config.width,
            self.config.height,
        )
        .await
        .map_err(|e| {
            KlippError::Segmentation(format!(
                "Clip {:.1}-{:.1}s: {}",
                span.start_seconds, span.end_seconds, e
            ))
        })?;

        let audio_path = if source.has_audio {
            if let Some(parent) = wav_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            match extract_clip_audio(&source.path, &wav_path, span.start_seconds, span.end_seconds).await {
                Ok(()) => Some(wav_path),
                Err(e) => {
                    warn!("Audio extraction failed for clip {}: {}", span.order, e);
                    None
                }
            }
        } else {
            None
        };

        Ok(ClipFiles {
            span,
            video_path,
            audio_path,
        })
    }
}

/// Remove clip files, ignoring ones that are already gone.
pub fn remove_clip_files(paths: &[&Path]) -> usize {
    let mut removed = 0;
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {:?}: {}", path, e),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::VideoProbe;

    fn source(duration: f64) -> VideoSource {
        source_at("/videos/demo.mp4", duration)
    }

    fn source_at(path: &str, duration: f64) -> VideoSource {
        VideoSource::from_probe(
            PathBuf::from(path),
            VideoProbe {
                duration_seconds: duration,
                has_audio: false,
                width: None,
                height: None,
            },
        )
    }

    #[tokio::test]
    async fn test_plan_rejects_too_short_video() {
        let segmenter = VideoSegmenter::new(
            SegmentationConfig::default(),
            PathBuf::from("/tmp/v"),
            PathBuf::from("/tmp/a"),
        );
        let err = segmenter.plan(&source(0.5)).await.unwrap_err();
        assert!(matches!(err, KlippError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_plan_fixed() {
        let segmenter = VideoSegmenter::new(
            SegmentationConfig::default(),
            PathBuf::from("/tmp/v"),
            PathBuf::from("/tmp/a"),
        );
        let spans = segmenter.plan(&source(95.0)).await.unwrap();
        assert_eq!(spans.len(), 4);
        assert_eq!(spans[3].end_seconds, 95.0);
    }

    #[test]
    fn test_clip_paths_are_per_video() {
        let segmenter = VideoSegmenter::new(
            SegmentationConfig::default(),
            PathBuf::from("/data/clips/video"),
            PathBuf::from("/data/clips/audio"),
        );
        let span = ClipSpan::new(0, 0.0, 30.0);

        let (mp4_video, mp4_audio) = segmenter.clip_paths(&source_at("/videos/talk.mp4", 60.0), &span);
        let (mkv_video, mkv_audio) = segmenter.clip_paths(&source_at("/videos/talk.mkv", 60.0), &span);

        assert_eq!(mp4_video, PathBuf::from("/data/clips/video/talk.mp4/talk_0.0_30.0.mp4"));
        assert_eq!(mp4_audio, PathBuf::from("/data/clips/audio/talk.mp4/talk_0.0_30.0.wav"));
        assert_ne!(mp4_video, mkv_video);
        assert_ne!(mp4_audio, mkv_audio);
    }

    #[test]
    fn test_remove_video_dirs_keeps_non_empty() {
        let root = tempfile::tempdir().unwrap();
        let segmenter = VideoSegmenter::new(
            SegmentationConfig::default(),
            root.path().join("video"),
            root.path().join("audio"),
        );
        std::fs::create_dir_all(root.path().join("video/a.mp4")).unwrap();
        std::fs::create_dir_all(root.path().join("video/b.mp4")).unwrap();
        std::fs::write(root.path().join("video/b.mp4/clip.mp4"), b"x").unwrap();

        segmenter.remove_video_dirs("a.mp4");
        segmenter.remove_video_dirs("b.mp4");
        assert!(!root.path().join("video/a.mp4").exists());
        assert!(root.path().join("video/b.mp4/clip.mp4").exists());
    }

    #[test]
    fn test_remove_clip_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        std::fs::write(&a, b"x").unwrap();
        let missing = dir.path().join("missing.wav");
        assert_eq!(remove_clip_files(&[a.as_path(), missing.as_path()]), 1);
        assert!(!a.exists());
    }
}
