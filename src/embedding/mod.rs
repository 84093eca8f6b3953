//! Multimodal embedding generation.
//!
//! Clips and queries are embedded into one shared space by an external
//! embedding service; this module only talks to it and checks what comes back.

mod http;

pub use http::HttpEmbedder;

use crate::error::{KlippError, Result};
use crate::segmentation::ClipFiles;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Input modality understood by the embedding service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Vision,
    Audio,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Modality::Text => write!(f, "text"),
            Modality::Vision => write!(f, "vision"),
            Modality::Audio => write!(f, "audio"),
        }
    }
}

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a text query.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a media file (video clip or audio track).
    async fn embed_media(&self, modality: Modality, path: &Path) -> Result<Vec<f32>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}

/// Embed a clip: the vision embedding averaged with the audio embedding when
/// the clip has audio.
///
/// A failed audio embedding falls back to vision only; a failed vision
/// embedding fails the clip.
pub async fn embed_clip(embedder: &dyn Embedder, clip: &ClipFiles) -> Result<Vec<f32>> {
    let vision = embedder
        .embed_media(Modality::Vision, &clip.video_path)
        .await?;
    validate_embedding(&vision, embedder.dimensions())?;

    let audio = match &clip.audio_path {
        Some(path) => match embedder.embed_media(Modality::Audio, path).await {
            Ok(audio) => match validate_embedding(&audio, embedder.dimensions()) {
                Ok(()) => Some(audio),
                Err(e) => {
                    warn!("Discarding audio embedding for clip {}: {}", clip.span.order, e);
                    None
                }
            },
            Err(e) => {
                warn!("Audio embedding failed for clip {}: {}", clip.span.order, e);
                None
            }
        },
        None => None,
    };

    if audio.is_some() {
        debug!("Combining vision and audio embeddings");
    } else {
        debug!("Using vision embedding only");
    }

    let combined = combine_embeddings(vision, audio.as_deref())?;
    validate_embedding(&combined, embedder.dimensions())?;
    Ok(combined)
}

/// Element-wise mean of the vision and audio embeddings.
pub fn combine_embeddings(vision: Vec<f32>, audio: Option<&[f32]>) -> Result<Vec<f32>> {
    match audio {
        None => Ok(vision),
        Some(audio) if audio.len() != vision.len() => Err(KlippError::Embedding(format!(
            "Vision and audio embeddings differ in length ({} vs {})",
            vision.len(),
            audio.len()
        ))),
        Some(audio) => Ok(vision
            .iter()
            .zip(audio)
            .map(|(v, a)| (v + a) / 2.0)
            .collect()),
    }
}

/// Check that an embedding can be indexed: right length, finite, not all zero.
pub fn validate_embedding(embedding: &[f32], dimensions: usize) -> Result<()> {
    if embedding.len() != dimensions {
        return Err(KlippError::Embedding(format!(
            "Expected {} dimensions, got {}",
            dimensions,
            embedding.len()
        )));
    }
    if embedding.iter().any(|x| !x.is_finite()) {
        return Err(KlippError::Embedding(
            "Embedding contains non-finite values".to_string(),
        ));
    }
    if embedding.iter().all(|x| *x == 0.0) {
        return Err(KlippError::Embedding("Embedding is all zeros".to_string()));
    }
    Ok(())
}

/// Coarse label for a clip embedding.
///
/// The dimension with the largest magnitude selects one of four equal bands of
/// the embedding space.
pub fn describe_embedding(embedding: &[f32]) -> String {
    const BANDS: [&str; 4] = [
        "Scene/Background",
        "Objects/People",
        "Motion/Action",
        "Visual effects",
    ];

    let dominant = embedding
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.abs()
                .partial_cmp(&b.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i);

    match dominant {
        None => "No visual features".to_string(),
        Some(index) => {
            let band_width = embedding.len().div_ceil(BANDS.len()).max(1);
            let band = (index / band_width).min(BANDS.len() - 1);
            format!("{} (feature #{})", BANDS[band], index)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::segmentation::ClipSpan;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Embedder returning canned vectors keyed by text or file name.
    pub struct FakeEmbedder {
        pub dims: usize,
        pub vectors: HashMap<String, Vec<f32>>,
        pub calls: Mutex<Vec<(Modality, String)>>,
    }

    impl FakeEmbedder {
        pub fn new(dims: usize) -> Self {
            Self {
                dims,
                vectors: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn with(mut self, key: &str, vector: Vec<f32>) -> Self {
            self.vectors.insert(key.to_string(), vector);
            self
        }

        fn lookup(&self, modality: Modality, key: &str) -> Result<Vec<f32>> {
            self.calls.lock().unwrap().push((modality, key.to_string()));
            self.vectors
                .get(key)
                .cloned()
                .ok_or_else(|| KlippError::Embedding(format!("no vector for {}", key)))
        }
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
            self.lookup(Modality::Text, text)
        }

        async fn embed_media(&self, modality: Modality, path: &Path) -> Result<Vec<f32>> {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            self.lookup(modality, name)
        }

        fn dimensions(&self) -> usize {
            self.dims
        }
    }

    fn clip(video: &str, audio: Option<&str>) -> ClipFiles {
        ClipFiles {
            span: ClipSpan::new(0, 0.0, 30.0),
            video_path: PathBuf::from(video),
            audio_path: audio.map(PathBuf::from),
        }
    }

    #[test]
    fn test_combine_embeddings_averages() {
        let combined = combine_embeddings(vec![1.0, 0.0, 2.0], Some(&[0.0, 1.0, 2.0])).unwrap();
        assert_eq!(combined, vec![0.5, 0.5, 2.0]);
        assert!(combine_embeddings(vec![1.0], Some(&[1.0, 2.0])).is_err());
    }

    #[test]
    fn test_validate_embedding() {
        assert!(validate_embedding(&[0.1, 0.2], 2).is_ok());
        assert!(validate_embedding(&[0.1, 0.2], 3).is_err());
        assert!(validate_embedding(&[0.0, 0.0], 2).is_err());
        assert!(validate_embedding(&[f32::NAN, 1.0], 2).is_err());
        assert!(validate_embedding(&[], 0).is_err());
    }

    #[test]
    fn test_describe_embedding_bands() {
        let mut v = vec![0.0f32; 8];
        v[1] = 0.9;
        assert_eq!(describe_embedding(&v), "Scene/Background (feature #1)");
        v[7] = -2.0;
        assert_eq!(describe_embedding(&v), "Visual effects (feature #7)");
        assert_eq!(describe_embedding(&[]), "No visual features");
    }

    #[tokio::test]
    async fn test_embed_clip_with_audio() {
        let embedder = FakeEmbedder::new(2)
            .with("c.mp4", vec![1.0, 0.0])
            .with("c.wav", vec![0.0, 1.0]);
        let v = embed_clip(&embedder, &clip("/x/c.mp4", Some("/x/c.wav"))).await.unwrap();
        assert_eq!(v, vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn test_embed_clip_audio_failure_falls_back_to_vision() {
        let embedder = FakeEmbedder::new(2).with("c.mp4", vec![1.0, 0.0]);
        let v = embed_clip(&embedder, &clip("/x/c.mp4", Some("/x/missing.wav"))).await.unwrap();
        assert_eq!(v, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_embed_clip_rejects_zero_vision() {
        let embedder = FakeEmbedder::new(2).with("c.mp4", vec![0.0, 0.0]);
        assert!(embed_clip(&embedder, &clip("/x/c.mp4", None)).await.is_err());
    }
}
