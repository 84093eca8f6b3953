//! SQLite-based vector store implementation.
//!
//! Embeddings are stored as little-endian f32 blobs and similarity is computed
//! in Rust. A flat scan is fine at the scale of a personal video library.

use super::{
    check_clip_dimensions, check_query_dimensions, cosine_similarity, rank, ClipRecord,
    IndexedVideo, SearchResult, VectorStore, VideoRecord,
};
use crate::error::{KlippError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS videos (
    video_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    source_path TEXT NOT NULL,
    duration_seconds REAL NOT NULL,
    has_audio INTEGER NOT NULL,
    processed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS clips (
    id TEXT PRIMARY KEY,
    video_id TEXT NOT NULL,
    video_title TEXT NOT NULL,
    clip_order INTEGER NOT NULL,
    start_seconds REAL NOT NULL,
    end_seconds REAL NOT NULL,
    transcript TEXT,
    visual_description TEXT NOT NULL,
    clip_path TEXT NOT NULL,
    audio_path TEXT,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_clips_video_id ON clips(video_id);
"#;

const CLIP_COLUMNS: &str = "id, video_id, video_title, clip_order, start_seconds, end_seconds, \
    transcript, visual_description, clip_path, audio_path, embedding, indexed_at";

const VIDEO_QUERY: &str = r#"
SELECT v.video_id, v.title, v.source_path, v.duration_seconds, v.has_audio,
       COUNT(c.id) AS clip_count, v.processed_at
FROM videos v
LEFT JOIN clips c ON c.video_id = v.video_id
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    dimensions: usize,
}

impl SqliteVectorStore {
    /// Open (or create) a store at `path` holding `dimensions`-long embeddings.
    #[instrument(skip_all)]
    pub fn new(path: &Path, dimensions: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let store = Self::init(conn, dimensions)?;
        info!("Initialized SQLite vector store at {:?}", path);
        Ok(store)
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory(dimensions: usize) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, dimensions)
    }

    fn init(conn: Connection, dimensions: usize) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;

        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'dimensions'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            Some(value) if value != dimensions.to_string() => {
                return Err(KlippError::Config(format!(
                    "Index was built with {} dimensions but embedding.dimensions is {}",
                    value, dimensions
                )));
            }
            Some(_) => {}
            None => {
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES ('dimensions', ?1)",
                    params![dimensions.to_string()],
                )?;
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
            dimensions,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| KlippError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn parse_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn clip_from_row(row: &Row<'_>) -> rusqlite::Result<ClipRecord> {
        let id_str: String = row.get(0)?;
        let embedding_bytes: Vec<u8> = row.get(10)?;
        let indexed_at_str: String = row.get(11)?;

        Ok(ClipRecord {
            id: Uuid::parse_str(&id_str).unwrap_or_default(),
            video_id: row.get(1)?,
            video_title: row.get(2)?,
            clip_order: row.get(3)?,
            start_seconds: row.get(4)?,
            end_seconds: row.get(5)?,
            transcript: row.get(6)?,
            visual_description: row.get(7)?,
            clip_path: row.get(8)?,
            audio_path: row.get(9)?,
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: Self::parse_time(&indexed_at_str),
        })
    }

    fn video_from_row(row: &Row<'_>) -> rusqlite::Result<IndexedVideo> {
        let processed_at_str: String = row.get(6)?;
        Ok(IndexedVideo {
            video_id: row.get(0)?,
            title: row.get(1)?,
            source_path: row.get(2)?,
            duration_seconds: row.get(3)?,
            has_audio: row.get(4)?,
            clip_count: row.get(5)?,
            processed_at: Self::parse_time(&processed_at_str),
        })
    }
}

fn score_clip(query_embedding: &[f32], clip: ClipRecord) -> SearchResult {
    SearchResult {
        score: cosine_similarity(query_embedding, &clip.embedding),
        clip,
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, video, clips), fields(video_id = %video.video_id))]
    async fn index_video(&self, video: &VideoRecord, clips: &[ClipRecord]) -> Result<usize> {
        check_clip_dimensions(clips, self.dimensions)?;

        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute("DELETE FROM clips WHERE video_id = ?1", params![video.video_id])?;
        tx.execute(
            r#"
            INSERT OR REPLACE INTO videos
            (video_id, title, source_path, duration_seconds, has_audio, processed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                video.video_id,
                video.title,
                video.source_path,
                video.duration_seconds,
                video.has_audio,
                video.processed_at.to_rfc3339(),
            ],
        )?;

        for clip in clips {
            tx.execute(
                &format!(
                    "INSERT OR REPLACE INTO clips ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    CLIP_COLUMNS
                ),
                params![
                    clip.id.to_string(),
                    clip.video_id,
                    clip.video_title,
                    clip.clip_order,
                    clip.start_seconds,
                    clip.end_seconds,
                    clip.transcript,
                    clip.visual_description,
                    clip.clip_path,
                    clip.audio_path,
                    Self::embedding_to_bytes(&clip.embedding),
                    clip.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        info!("Indexed {} clips for video {}", clips.len(), video.video_id);
        Ok(clips.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search_with_threshold(
        &self,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
        video_id: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        check_query_dimensions(query_embedding, self.dimensions)?;

        let conn = self.lock()?;
        let scored: Vec<SearchResult> = match video_id {
            Some(id) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM clips WHERE video_id = ?1",
                    CLIP_COLUMNS
                ))?;
                let rows = stmt.query_map(params![id], Self::clip_from_row)?;
                let scored: Vec<SearchResult> = rows
                    .filter_map(|r| r.ok())
                    .map(|clip| score_clip(query_embedding, clip))
                    .collect();
                scored
            }
            None => {
                let mut stmt = conn.prepare(&format!("SELECT {} FROM clips", CLIP_COLUMNS))?;
                let rows = stmt.query_map([], Self::clip_from_row)?;
                let scored: Vec<SearchResult> = rows
                    .filter_map(|r| r.ok())
                    .map(|clip| score_clip(query_embedding, clip))
                    .collect();
                scored
            }
        };

        let results = rank(scored, limit, min_score);
        debug!("Found {} matching clips", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn delete_video(&self, video_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let deleted = tx.execute("DELETE FROM clips WHERE video_id = ?1", params![video_id])?;
        tx.execute("DELETE FROM videos WHERE video_id = ?1", params![video_id])?;
        tx.commit()?;

        info!("Deleted {} clips for video {}", deleted, video_id);
        Ok(deleted)
    }

    #[instrument(skip(self))]
    async fn list_videos(&self) -> Result<Vec<IndexedVideo>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} GROUP BY v.video_id ORDER BY v.processed_at DESC",
            VIDEO_QUERY
        ))?;
        let videos = stmt.query_map([], Self::video_from_row)?;
        let result: Vec<IndexedVideo> = videos.filter_map(|v| v.ok()).collect();
        Ok(result)
    }

    #[instrument(skip(self))]
    async fn get_video(&self, video_id: &str) -> Result<Option<IndexedVideo>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE v.video_id = ?1 GROUP BY v.video_id",
            VIDEO_QUERY
        ))?;
        let video = stmt
            .query_row(params![video_id], Self::video_from_row)
            .optional()?;
        Ok(video)
    }

    #[instrument(skip(self))]
    async fn get_clips(&self, video_id: &str) -> Result<Vec<ClipRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM clips WHERE video_id = ?1 ORDER BY clip_order",
            CLIP_COLUMNS
        ))?;
        let clips = stmt.query_map(params![video_id], Self::clip_from_row)?;
        let result: Vec<ClipRecord> = clips.filter_map(|c| c.ok()).collect();
        debug!("Found {} clips for video {}", result.len(), video_id);
        Ok(result)
    }

    async fn get_clip(&self, id: Uuid) -> Result<Option<ClipRecord>> {
        let conn = self.lock()?;
        let clip = conn
            .query_row(
                &format!("SELECT {} FROM clips WHERE id = ?1", CLIP_COLUMNS),
                params![id.to_string()],
                Self::clip_from_row,
            )
            .optional()?;
        Ok(clip)
    }

    async fn clip_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM clips", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::tests::{clip, video};

    #[tokio::test]
    async fn test_sqlite_vector_store() {
        let store = SqliteVectorStore::in_memory(3).unwrap();

        let clips = vec![
            clip("video1", 0, vec![1.0, 0.0, 0.0]),
            clip("video1", 1, vec![0.0, 1.0, 0.0]),
        ];
        let indexed = store.index_video(&video("video1"), &clips).await.unwrap();
        assert_eq!(indexed, 2);

        let videos = store.list_videos().await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].video_id, "video1");
        assert_eq!(videos[0].clip_count, 2);
        assert!(videos[0].has_audio);

        let results = store.search(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!((results[0].score - 1.0).abs() < 0.001);
        assert_eq!(results[0].clip.clip_order, 0);
        assert_eq!(results[0].clip.transcript.as_deref(), Some("transcript 0"));
        assert_eq!(results[0].clip.embedding, vec![1.0, 0.0, 0.0]);

        let deleted = store.delete_video("video1").await.unwrap();
        assert_eq!(deleted, 2);
        assert!(store.list_videos().await.unwrap().is_empty());
        assert!(!store.is_video_indexed("video1").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_wrong_dimensions() {
        let store = SqliteVectorStore::in_memory(3).unwrap();

        let clips = vec![
            clip("video1", 0, vec![1.0, 0.0, 0.0]),
            clip("video1", 1, vec![1.0, 0.0]),
        ];
        let err = store.index_video(&video("video1"), &clips).await.unwrap_err();
        assert!(matches!(err, KlippError::VectorStore(_)));

        // Nothing is written when a batch is rejected
        assert_eq!(store.clip_count().await.unwrap(), 0);
        assert!(store.get_video("video1").await.unwrap().is_none());

        let err = store.search(&[1.0, 0.0], 3).await.unwrap_err();
        assert!(matches!(err, KlippError::VectorStore(_)));
    }

    #[tokio::test]
    async fn test_scoped_search_and_reindex() {
        let store = SqliteVectorStore::in_memory(2).unwrap();
        store
            .index_video(&video("a"), &[clip("a", 0, vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .index_video(&video("b"), &[clip("b", 0, vec![1.0, 0.1])])
            .await
            .unwrap();

        let scoped = store
            .search_with_threshold(&[1.0, 0.0], 5, 0.0, Some("b"))
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].clip.video_id, "b");

        // Re-indexing replaces the previous clips
        store
            .index_video(
                &video("a"),
                &[clip("a", 0, vec![0.0, 1.0]), clip("a", 1, vec![0.0, 1.0])],
            )
            .await
            .unwrap();
        assert_eq!(store.get_clips("a").await.unwrap().len(), 2);
        assert_eq!(store.clip_count().await.unwrap(), 3);

        let first = store.get_clips("a").await.unwrap().remove(0);
        let fetched = store.get_clip(first.id).await.unwrap().unwrap();
        assert_eq!(fetched.video_id, "a");
    }

    #[test]
    fn test_reopen_with_other_dimensions_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");

        SqliteVectorStore::new(&path, 4).unwrap();
        assert!(SqliteVectorStore::new(&path, 4).is_ok());
        assert!(matches!(
            SqliteVectorStore::new(&path, 8),
            Err(KlippError::Config(_))
        ));
    }
}
