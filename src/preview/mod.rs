//! Animated GIF previews of retrieved clips.
//!
//! Previews are rendered with ffmpeg into the preview directory and cleaned up
//! once they are older than a configured age.

use crate::config::{PreviewQuality, PreviewSettings};
use crate::error::{KlippError, Result};
use crate::media::{probe_video, run_tool};
use crate::rag::ContextClip;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, instrument, warn};

/// Longest an ffmpeg preview render may take.
const RENDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Frame rate used for query result previews.
pub const RESULT_FPS: u32 = 8;
/// Width used for query result previews.
pub const RESULT_WIDTH: u32 = 280;
/// Longest query result preview in seconds.
pub const RESULT_MAX_SECONDS: f64 = 8.0;

/// Rendering options for one preview.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewOptions {
    pub fps: u32,
    pub width: u32,
    pub quality: PreviewQuality,
    pub max_duration_seconds: f64,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self::from(&PreviewSettings::default())
    }
}

impl From<&PreviewSettings> for PreviewOptions {
    fn from(settings: &PreviewSettings) -> Self {
        Self {
            fps: settings.fps,
            width: settings.width,
            quality: settings.quality,
            max_duration_seconds: settings.max_duration_seconds,
        }
    }
}

impl PreviewOptions {
    /// The ffmpeg filter graph for these options.
    pub fn filter_graph(&self) -> String {
        let base = format!("fps={},scale={}:-1", self.fps, self.width);
        match self.quality {
            PreviewQuality::Low => format!("{}:flags=fast_bilinear", base),
            PreviewQuality::Medium => format!(
                "{}:flags=lanczos,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse",
                base
            ),
            PreviewQuality::High => format!(
                "{}:flags=lanczos,split[s0][s1];[s0]palettegen=max_colors=256[p];[s1][p]paletteuse=dither=bayer:bayer_scale=3",
                base
            ),
        }
    }
}

/// A rendered preview for one retrieved clip.
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub preview_path: PathBuf,
    /// Preview file name inside the preview directory.
    pub file_name: String,
    pub clip_id: uuid::Uuid,
    pub clip_path: String,
    pub video_id: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub score: f32,
    pub visual_description: String,
    pub transcript: Option<String>,
}

/// Size and stream information about a rendered preview.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewInfo {
    pub path: PathBuf,
    pub file_size: u64,
    pub file_size_mb: f64,
    pub duration_seconds: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Renders GIF previews into a directory.
pub struct PreviewGenerator {
    dir: PathBuf,
    options: PreviewOptions,
}

impl PreviewGenerator {
    /// Create a generator writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>, options: PreviewOptions) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, options })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Render `[start, end)` of `clip_path` (clip-relative seconds) as a GIF.
    ///
    /// Without `output_name` the file is named after the clip and time range.
    #[instrument(skip(self, options), fields(clip = %clip_path.display()))]
    pub async fn create_preview(
        &self,
        clip_path: &Path,
        start: f64,
        end: f64,
        output_name: Option<&str>,
        options: Option<&PreviewOptions>,
    ) -> Result<PathBuf> {
        if !clip_path.exists() {
            return Err(KlippError::Preview(format!(
                "Clip file not found: {}",
                clip_path.display()
            )));
        }

        let options = options.unwrap_or(&self.options);
        let duration = (end - start).min(options.max_duration_seconds);
        if duration <= 0.0 {
            return Err(KlippError::Preview(format!(
                "Invalid preview duration {:.2}s",
                duration
            )));
        }

        let name = match output_name {
            Some(name) => name.to_string(),
            None => {
                let stem = clip_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "clip".to_string());
                format!("{}_{:.1}_{:.1}", stem, start, end)
            }
        };
        let gif_path = self.dir.join(format!("{}.gif", name));

        let args: Vec<OsString> = vec![
            "-y".into(),
            "-loglevel".into(),
            "error".into(),
            "-ss".into(),
            start.to_string().into(),
            "-t".into(),
            duration.to_string().into(),
            "-i".into(),
            clip_path.as_os_str().to_owned(),
            "-vf".into(),
            options.filter_graph().into(),
            "-loop".into(),
            "0".into(),
            gif_path.as_os_str().to_owned(),
        ];

        tokio::time::timeout(RENDER_TIMEOUT, run_tool("ffmpeg", args))
            .await
            .map_err(|_| KlippError::Preview("GIF rendering timed out".to_string()))??;

        if !gif_path.exists() {
            return Err(KlippError::Preview(format!(
                "ffmpeg produced no output at {}",
                gif_path.display()
            )));
        }

        debug!("Created preview {:?}", gif_path);
        Ok(gif_path)
    }

    /// Render previews for the best `max_previews` retrieved clips.
    ///
    /// Clips whose preview fails are skipped.
    pub async fn create_previews_for_results(
        &self,
        clips: &[ContextClip],
        max_previews: usize,
    ) -> Vec<Preview> {
        let options = PreviewOptions {
            fps: RESULT_FPS,
            width: RESULT_WIDTH,
            ..self.options.clone()
        };

        let mut previews = Vec::new();
        for (i, clip) in clips.iter().take(max_previews).enumerate() {
            let clip_path = Path::new(&clip.clip_path);
            let length = (clip.end_seconds - clip.start_seconds).min(RESULT_MAX_SECONDS);
            let name = result_preview_name(i, clip);

            match self
                .create_preview(clip_path, 0.0, length, Some(&name), Some(&options))
                .await
            {
                Ok(path) => previews.push(Preview {
                    file_name: format!("{}.gif", name),
                    preview_path: path,
                    clip_id: clip.clip_id,
                    clip_path: clip.clip_path.clone(),
                    video_id: clip.video_id.clone(),
                    start_seconds: clip.start_seconds,
                    end_seconds: clip.end_seconds,
                    score: clip.score,
                    visual_description: clip.visual_description.clone(),
                    transcript: clip.transcript.clone(),
                }),
                Err(e) => warn!("Failed to create preview for result {}: {}", i + 1, e),
            }
        }

        info!(
            "Created {} previews from {} results",
            previews.len(),
            clips.len()
        );
        previews
    }

    /// Remove previews older than `max_age`.
    pub fn cleanup(&self, max_age: Duration) -> Result<usize> {
        cleanup_old_previews(&self.dir, max_age)
    }
}

/// Name for the preview of the `index`-th result.
///
/// The clip ID suffix keeps concurrent queries from overwriting each other.
fn result_preview_name(index: usize, clip: &ContextClip) -> String {
    let id = clip.clip_id.simple().to_string();
    format!(
        "result_{}_score_{:.3}_{}",
        index + 1,
        clip.score,
        &id[..8]
    )
}

/// Delete `.gif` files in `dir` last modified more than `max_age` ago.
pub fn cleanup_old_previews(dir: &Path, max_age: Duration) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut deleted = 0;

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("gif") {
            continue;
        }

        let age = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());

        if age.is_some_and(|age| age > max_age) {
            match std::fs::remove_file(&path) {
                Ok(()) => deleted += 1,
                Err(e) => warn!("Could not delete {:?}: {}", path, e),
            }
        }
    }

    if deleted > 0 {
        info!("Cleaned up {} old previews", deleted);
    }
    Ok(deleted)
}

/// Describe a rendered preview, or `None` if it does not exist.
///
/// Stream details are filled in when ffprobe can read the file.
pub async fn preview_info(path: &Path) -> Result<Option<PreviewInfo>> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let file_size = metadata.len();
    let mut info = PreviewInfo {
        path: path.to_path_buf(),
        file_size,
        file_size_mb: file_size as f64 / (1024.0 * 1024.0),
        duration_seconds: None,
        width: None,
        height: None,
    };

    match probe_video(path).await {
        Ok(probe) => {
            info.duration_seconds = Some(probe.duration_seconds);
            info.width = probe.width;
            info.height = probe.height;
        }
        Err(e) => warn!("Could not get detailed preview info: {}", e),
    }

    Ok(Some(info))
}
