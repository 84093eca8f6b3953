//! Pipeline orchestrator for Klipp.
//!
//! Coordinates the process from a source video to indexed clips, and from a
//! question to an answer with previews.

use crate::config::{Prompts, Settings};
use crate::embedding::{describe_embedding, embed_clip, Embedder, HttpEmbedder};
use crate::error::{KlippError, Result};
use crate::generation::{create_generator, Generator};
use crate::preview::{Preview, PreviewGenerator, PreviewOptions};
use crate::rag::{ContextClip, RagEngine};
use crate::segmentation::{remove_clip_files, ClipFiles, ClipSpan, SegmentationConfig, VideoSegmenter};
use crate::source::VideoSource;
use crate::transcription::{Transcriber, WhisperTranscriber};
use crate::vector_store::{ClipRecord, SearchResult, SqliteVectorStore, VectorStore, VideoRecord};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Callback receiving `(finished, total)` as clips complete.
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// The main orchestrator for the Klipp pipeline.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    embedder: Arc<dyn Embedder>,
    transcriber: Option<Arc<dyn Transcriber>>,
    generator: Arc<dyn Generator>,
    vector_store: Arc<dyn VectorStore>,
    segmenter: VideoSegmenter,
    previews: PreviewGenerator,
}

impl Orchestrator {
    /// Create a new orchestrator from settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::from_settings(&settings.embedding)?);

        let transcriber: Option<Arc<dyn Transcriber>> = if settings.transcription.enabled {
            info!("Clip transcription enabled ({})", settings.transcription.model);
            Some(Arc::new(WhisperTranscriber::from_settings(
                &settings.transcription,
            )?))
        } else {
            None
        };

        let generator = create_generator(&settings.generation)?;
        debug!("Answer generation with {}", generator.model());

        let vector_store = Arc::new(SqliteVectorStore::new(
            &settings.sqlite_path(),
            settings.embedding.dimensions as usize,
        )?);

        Self::with_components(
            settings,
            prompts,
            embedder,
            transcriber,
            generator,
            vector_store,
        )
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        embedder: Arc<dyn Embedder>,
        transcriber: Option<Arc<dyn Transcriber>>,
        generator: Arc<dyn Generator>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let video_dir = settings.clip_video_dir();
        let audio_dir = settings.clip_audio_dir();
        std::fs::create_dir_all(&video_dir)?;
        std::fs::create_dir_all(&audio_dir)?;

        let segmenter = VideoSegmenter::new(
            SegmentationConfig::from(&settings.segmentation),
            video_dir,
            audio_dir,
        );
        let previews = PreviewGenerator::new(
            settings.preview_dir(),
            PreviewOptions::from(&settings.preview),
        )?;

        Ok(Self {
            settings,
            prompts,
            embedder,
            transcriber,
            generator,
            vector_store,
            segmenter,
            previews,
        })
    }

    /// Get a reference to the vector store.
    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.vector_store.clone()
    }

    /// Get a reference to the embedder.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get the preview generator.
    pub fn previews(&self) -> &PreviewGenerator {
        &self.previews
    }

    /// Ingest a local video file: segment, embed, and index its clips.
    #[instrument(skip(self, progress), fields(input = %input))]
    pub async fn process_video(
        &self,
        input: &str,
        force: bool,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<IngestResult> {
        let source = VideoSource::open(input, &self.settings.segmentation.supported_formats).await?;
        self.process_source(source, force, progress).await
    }

    /// Ingest an already probed source video.
    #[instrument(skip(self, source, progress), fields(video_id = %source.id))]
    pub async fn process_source(
        &self,
        source: VideoSource,
        force: bool,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<IngestResult> {
        if let Some(existing) = self.vector_store.get_video(&source.id).await? {
            if !force {
                info!("Video {} is already indexed, skipping", source.id);
                return Ok(IngestResult {
                    video_id: existing.video_id,
                    title: existing.title,
                    clips_total: existing.clip_count as usize,
                    clips_indexed: existing.clip_count as usize,
                    skipped: true,
                });
            }

            info!("Re-ingesting {}, removing previous clips", source.id);
            self.remove_video(&source.id).await?;
        }

        let spans = self.segmenter.plan(&source).await?;
        let total = spans.len();
        info!("Processing {} clips of '{}'", total, source.title);

        let finished = AtomicUsize::new(0);
        let records: Vec<ClipRecord> = stream::iter(spans)
            .map(|span| self.extract_clip(&source, span))
            .buffered(self.settings.processing.max_concurrent_clips.max(1))
            .filter_map(|result| {
                let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(report) = progress {
                    report(done, total);
                }
                async move {
                    match result {
                        Ok(record) => Some(record),
                        Err(e) => {
                            warn!("Skipping clip: {}", e);
                            None
                        }
                    }
                }
            })
            .collect()
            .await;

        self.store_clips(&source, total, records).await
    }

    /// Embed and index clips that are already on disk.
    pub async fn index_clips(&self, source: &VideoSource, clips: Vec<ClipFiles>) -> Result<IngestResult> {
        let total = clips.len();
        let records: Vec<ClipRecord> = stream::iter(clips)
            .map(|files| async move {
                let result = self.describe_clip(source, &files).await;
                if result.is_err() {
                    discard_clip_files(&files);
                }
                result
            })
            .buffered(self.settings.processing.max_concurrent_clips.max(1))
            .filter_map(|result| async move {
                match result {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!("Skipping clip: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        self.store_clips(source, total, records).await
    }

    /// Cut one clip and compute its features.
    async fn extract_clip(&self, source: &VideoSource, span: ClipSpan) -> Result<ClipRecord> {
        let files = self.segmenter.cut(source, span).await?;
        let result = self.describe_clip(source, &files).await;
        if result.is_err() {
            discard_clip_files(&files);
        }
        result
    }

    /// Compute the embedding, transcript and visual description of a clip.
    #[instrument(skip(self, source, files), fields(order = files.span.order))]
    async fn describe_clip(&self, source: &VideoSource, files: &ClipFiles) -> Result<ClipRecord> {
        let embedding = embed_clip(self.embedder.as_ref(), files).await?;

        let transcript = match (&self.transcriber, &files.audio_path) {
            (Some(transcriber), Some(audio_path)) => match transcriber.transcribe(audio_path).await {
                Ok(t) if !t.is_empty() => Some(t.full_text),
                Ok(_) => None,
                Err(e) => {
                    warn!("Transcription failed for clip {}: {}", files.span.order, e);
                    None
                }
            },
            _ => None,
        };

        let visual_description = describe_embedding(&embedding);
        debug!("Clip {}: {}", files.span.order, visual_description);

        Ok(ClipRecord::new(
            source.id.clone(),
            source.title.clone(),
            files.span.order,
            files.span.start_seconds,
            files.span.end_seconds,
            transcript,
            visual_description,
            files.video_path.to_string_lossy().to_string(),
            files
                .audio_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
            embedding,
        ))
    }

    async fn store_clips(
        &self,
        source: &VideoSource,
        total: usize,
        records: Vec<ClipRecord>,
    ) -> Result<IngestResult> {
        if records.is_empty() {
            return Err(KlippError::Embedding(format!(
                "None of the {} clips of '{}' could be indexed",
                total, source.title
            )));
        }

        let video = VideoRecord {
            video_id: source.id.clone(),
            title: source.title.clone(),
            source_path: source.path.to_string_lossy().to_string(),
            duration_seconds: source.duration_seconds,
            has_audio: source.has_audio,
            processed_at: Utc::now(),
        };

        let indexed = self.vector_store.index_video(&video, &records).await?;
        info!("Indexed {}/{} clips of '{}'", indexed, total, source.title);

        Ok(IngestResult {
            video_id: video.video_id,
            title: video.title,
            clips_total: total,
            clips_indexed: indexed,
            skipped: false,
        })
    }

    /// Remove a video, its clips and its clip files.
    #[instrument(skip(self))]
    pub async fn remove_video(&self, video_id: &str) -> Result<RemoveResult> {
        if self.vector_store.get_video(video_id).await?.is_none() {
            return Err(KlippError::VideoNotFound(video_id.to_string()));
        }

        let clips = self.vector_store.get_clips(video_id).await?;
        let clips_removed = self.vector_store.delete_video(video_id).await?;

        let mut paths: Vec<&Path> = Vec::new();
        for clip in &clips {
            paths.push(Path::new(&clip.clip_path));
            if let Some(audio) = &clip.audio_path {
                paths.push(Path::new(audio));
            }
        }
        let files_removed = remove_clip_files(&paths);
        self.segmenter.remove_video_dirs(video_id);

        info!(
            "Removed video {} ({} clips, {} files)",
            video_id, clips_removed, files_removed
        );
        Ok(RemoveResult {
            clips_removed,
            files_removed,
        })
    }

    /// Search clips by text, optionally within one video.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        video_id: Option<&str>,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(KlippError::InvalidInput("Query is empty".to_string()));
        }
        self.check_scope(video_id).await?;

        let embedding = self.embedder.embed_text(query).await?;
        self.vector_store
            .search_with_threshold(&embedding, limit, min_score, video_id)
            .await
    }

    /// Build a RAG engine over the index.
    ///
    /// `top_k` overrides `retrieval.top_k`.
    pub fn rag_engine(&self, top_k: Option<usize>) -> RagEngine {
        RagEngine::new(
            self.vector_store.clone(),
            self.embedder.clone(),
            self.generator.clone(),
            top_k.unwrap_or(self.settings.retrieval.top_k),
            self.settings.retrieval.min_score,
        )
        .with_prompts(self.prompts.clone())
    }

    /// Answer a question and render previews of the supporting clips.
    #[instrument(skip(self))]
    pub async fn ask(
        &self,
        question: &str,
        video_id: Option<&str>,
        top_k: Option<usize>,
    ) -> Result<Answer> {
        self.check_scope(video_id).await?;

        let response = self.rag_engine(top_k).ask(question, video_id).await?;
        let previews = self.render_previews(&response.sources).await;

        Ok(Answer {
            answer: response.answer,
            sources: response.sources,
            previews,
        })
    }

    /// Render previews for retrieved clips when previews are enabled.
    pub async fn render_previews(&self, sources: &[ContextClip]) -> Vec<Preview> {
        if !self.settings.preview.enabled || sources.is_empty() {
            return Vec::new();
        }
        self.previews
            .create_previews_for_results(sources, self.settings.preview.max_previews)
            .await
    }

    /// Remove previews older than `preview.max_age_hours`.
    pub fn cleanup_previews(&self) -> Result<usize> {
        self.previews.cleanup(Duration::from_secs(
            self.settings.preview.max_age_hours * 3600,
        ))
    }

    async fn check_scope(&self, video_id: Option<&str>) -> Result<()> {
        if let Some(id) = video_id {
            if !self.vector_store.is_video_indexed(id).await? {
                return Err(KlippError::VideoNotFound(id.to_string()));
            }
        }
        Ok(())
    }
}

fn discard_clip_files(files: &ClipFiles) {
    let mut paths = vec![files.video_path.as_path()];
    if let Some(audio) = &files.audio_path {
        paths.push(audio.as_path());
    }
    remove_clip_files(&paths);
}

/// Result of ingesting a video.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestResult {
    pub video_id: String,
    pub title: String,
    /// Number of clips planned.
    pub clips_total: usize,
    /// Number of clips indexed.
    pub clips_indexed: usize,
    /// Whether processing was skipped (already indexed).
    pub skipped: bool,
}

/// Result of removing a video.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RemoveResult {
    pub clips_removed: usize,
    pub files_removed: usize,
}

/// An answer with its supporting clips and their previews.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<ContextClip>,
    pub previews: Vec<Preview>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::tests::FakeEmbedder;
    use crate::generation::tests::FakeGenerator;
    use crate::media::VideoProbe;
    use crate::transcription::{Transcript, TranscriptSegment};
    use crate::vector_store::MemoryVectorStore;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use tokio_test::assert_ok;

    struct FakeTranscriber;

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(&self, audio_path: &Path) -> Result<Transcript> {
            if audio_path.ends_with("broken.wav") {
                return Err(KlippError::Transcription("decoder error".to_string()));
            }
            Ok(Transcript::new(
                vec![TranscriptSegment::new(0.0, 2.0, "a dog barks".to_string())],
                Some("en".to_string()),
            ))
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        orchestrator: Orchestrator,
        generator: Arc<FakeGenerator>,
        source: VideoSource,
    }

    fn fixture(embedder: FakeEmbedder) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.general.data_dir = dir.path().to_string_lossy().to_string();
        settings.embedding.dimensions = 2;
        settings.preview.enabled = false;

        let generator = Arc::new(FakeGenerator::new("A dog in a park."));
        let orchestrator = Orchestrator::with_components(
            settings,
            Prompts::default(),
            Arc::new(embedder),
            Some(Arc::new(FakeTranscriber)),
            generator.clone(),
            Arc::new(MemoryVectorStore::new(2)),
        )
        .unwrap();

        let source = VideoSource::from_probe(
            PathBuf::from("/videos/park.mp4"),
            VideoProbe {
                duration_seconds: 65.5,
                has_audio: true,
                width: Some(1280),
                height: Some(720),
            },
        );

        Fixture {
            _dir: dir,
            orchestrator,
            generator,
            source,
        }
    }

    fn clip_files(dir: &Path, order: i32, audio: Option<&str>) -> ClipFiles {
        let video_path = dir.join(format!("c{}.mp4", order));
        std::fs::write(&video_path, b"\0").unwrap();
        ClipFiles {
            span: ClipSpan::new(order, order as f64 * 30.0, (order + 1) as f64 * 30.0),
            video_path,
            audio_path: audio.map(|a| dir.join(a)),
        }
    }

    fn embedder() -> FakeEmbedder {
        FakeEmbedder::new(2)
            .with("c0.mp4", vec![1.0, 0.0])
            .with("c0.wav", vec![1.0, 0.0])
            .with("c1.mp4", vec![0.0, 1.0])
            .with("c2.mp4", vec![0.0, 0.0])
            .with("dog", vec![1.0, 0.0])
    }

    #[tokio::test]
    async fn test_index_clips_skips_bad_embeddings() {
        let f = fixture(embedder());
        let dir = f.orchestrator.settings().clip_video_dir();
        let clips = vec![
            clip_files(&dir, 0, Some("c0.wav")),
            clip_files(&dir, 1, Some("broken.wav")),
            clip_files(&dir, 2, None),
        ];

        let result = f.orchestrator.index_clips(&f.source, clips).await.unwrap();
        assert_eq!(result.video_id, "park.mp4");
        assert_eq!(result.title, "park");
        assert_eq!(result.clips_total, 3);
        assert_eq!(result.clips_indexed, 2);
        assert!(!result.skipped);

        // The all-zero clip was discarded from disk
        assert!(!dir.join("c2.mp4").exists());

        let stored = f.orchestrator.vector_store().get_clips("park.mp4").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].transcript.as_deref(), Some("a dog barks"));
        assert_eq!(stored[0].visual_description, "Scene/Background (feature #0)");
        // Transcription failure keeps the clip without a transcript
        assert_eq!(stored[1].transcript, None);
    }

    #[tokio::test]
    async fn test_index_fails_when_no_clip_survives() {
        let f = fixture(embedder());
        let dir = f.orchestrator.settings().clip_video_dir();
        let clips = vec![clip_files(&dir, 2, None)];

        let result = f.orchestrator.index_clips(&f.source, clips).await;
        assert!(matches!(result, Err(KlippError::Embedding(_))));
        assert!(!f
            .orchestrator
            .vector_store()
            .is_video_indexed("park.mp4")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_already_indexed_is_skipped() {
        let f = fixture(embedder());
        let dir = f.orchestrator.settings().clip_video_dir();
        assert_ok!(
            f.orchestrator
                .index_clips(&f.source, vec![clip_files(&dir, 0, None)])
                .await
        );

        let result = f
            .orchestrator
            .process_source(f.source.clone(), false, None)
            .await
            .unwrap();
        assert!(result.skipped);
        assert_eq!(result.clips_indexed, 1);
    }

    #[tokio::test]
    async fn test_remove_video_deletes_rows_and_files() {
        let f = fixture(embedder());
        let dir = f.orchestrator.settings().clip_video_dir();
        let clips = vec![clip_files(&dir, 0, None), clip_files(&dir, 1, None)];
        assert_ok!(f.orchestrator.index_clips(&f.source, clips).await);

        let removed = f.orchestrator.remove_video("park.mp4").await.unwrap();
        assert_eq!(removed.clips_removed, 2);
        assert_eq!(removed.files_removed, 2);
        assert!(!dir.join("c0.mp4").exists());
        assert_eq!(f.orchestrator.vector_store().clip_count().await.unwrap(), 0);

        let missing = f.orchestrator.remove_video("park.mp4").await;
        assert!(matches!(missing, Err(KlippError::VideoNotFound(_))));
    }

    #[tokio::test]
    async fn test_same_stem_videos_keep_their_own_files() {
        let f = fixture(FakeEmbedder::new(2).with("talk_0.0_30.0.mp4", vec![1.0, 0.0]));
        let probe = || VideoProbe {
            duration_seconds: 30.0,
            has_audio: false,
            width: None,
            height: None,
        };
        let mp4 = VideoSource::from_probe(PathBuf::from("/videos/talk.mp4"), probe());
        let mkv = VideoSource::from_probe(PathBuf::from("/videos/talk.mkv"), probe());

        let mut kept = PathBuf::new();
        for source in [&mp4, &mkv] {
            let span = ClipSpan::new(0, 0.0, 30.0);
            let (video_path, _) = f.orchestrator.segmenter.clip_paths(source, &span);
            std::fs::create_dir_all(video_path.parent().unwrap()).unwrap();
            std::fs::write(&video_path, b"\0").unwrap();
            if source.id == "talk.mp4" {
                kept = video_path.clone();
            }
            let files = ClipFiles {
                span,
                video_path,
                audio_path: None,
            };
            assert_ok!(f.orchestrator.index_clips(source, vec![files]).await);
        }

        let removed = f.orchestrator.remove_video("talk.mkv").await.unwrap();
        assert_eq!(removed.files_removed, 1);

        let store = f.orchestrator.vector_store();
        let clips = store.get_clips("talk.mp4").await.unwrap();
        assert_eq!(clips.len(), 1);
        assert_eq!(Path::new(&clips[0].clip_path), kept.as_path());
        assert!(kept.exists());
    }

    #[tokio::test]
    async fn test_search_and_ask() {
        let f = fixture(embedder());
        let dir = f.orchestrator.settings().clip_video_dir();
        let clips = vec![clip_files(&dir, 0, None), clip_files(&dir, 1, None)];
        assert_ok!(f.orchestrator.index_clips(&f.source, clips).await);

        let results = f
            .orchestrator
            .search("dog", Some("park.mp4"), 5, 0.5)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].clip.clip_order, 0);

        let answer = f.orchestrator.ask("dog", None, Some(1)).await.unwrap();
        assert_eq!(answer.answer, "A dog in a park.");
        assert_eq!(answer.sources.len(), 1);
        assert!(answer.previews.is_empty());
        assert_eq!(f.generator.prompt_count(), 1);

        let err = f.orchestrator.ask("dog", Some("other.mp4"), None).await;
        assert!(matches!(err, Err(KlippError::VideoNotFound(_))));
        let err = f.orchestrator.search("  ", None, 5, 0.0).await;
        assert!(matches!(err, Err(KlippError::InvalidInput(_))));
    }
}
