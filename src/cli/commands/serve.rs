//! Web UI and HTTP API server.
//!
//! Serves the browser UI plus REST endpoints for uploading, searching,
//! asking, and the rendered GIF previews.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::KlippError;
use crate::orchestrator::{IngestResult, Orchestrator, RemoveResult};
use crate::preview::Preview;
use crate::rag::ContextClip;
use crate::source::{is_supported, sanitize};
use crate::vector_store::{ClipRecord, IndexedVideo};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{pin_mut, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{info, warn};
use uuid::Uuid;

const INDEX_HTML: &str = include_str!("../../../assets/index.html");

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
}

/// Run the web UI and HTTP API server.
pub async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    settings: Settings,
) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    let orchestrator = Orchestrator::new(settings)?;
    match orchestrator.cleanup_previews() {
        Ok(0) => {}
        Ok(n) => info!("Removed {} stale previews", n),
        Err(e) => warn!("Preview cleanup failed: {}", e),
    }

    let state = Arc::new(AppState { orchestrator });
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Klipp Server");
    println!();
    Output::success(&format!("Web UI at http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Upload", "POST   /videos");
    Output::kv("Ingest path", "POST   /videos/ingest");
    Output::kv("List videos", "GET    /videos");
    Output::kv("Get video", "GET    /videos/{video_id}");
    Output::kv("Remove video", "DELETE /videos/{video_id}");
    Output::kv("Get clip", "GET    /clips/{clip_id}");
    Output::kv("Search", "POST   /search");
    Output::kv("Ask (RAG)", "POST   /ask");
    Output::kv("Previews", "GET    /previews/{file}");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let settings = state.orchestrator.settings();
    let upload_limit = settings.server.max_upload_mb * 1024 * 1024;
    let previews = ServeDir::new(state.orchestrator.previews().dir());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route(
            "/videos",
            get(list_videos)
                .post(upload_video)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/videos/ingest", post(ingest_path))
        .route("/videos/{video_id}", get(get_video).delete(remove_video))
        .route("/clips/{clip_id}", get(get_clip))
        .route("/search", post(search))
        .route("/ask", post(ask))
        .nest_service("/previews", previews)
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct IngestRequest {
    /// Path to a video file on the server
    path: String,
    /// Force re-processing even if already indexed
    #[serde(default)]
    force: bool,
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    video_id: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    min_score: f32,
}

fn default_limit() -> usize {
    5
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<ContextClip>,
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    video_id: Option<String>,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<ContextClip>,
    previews: Vec<PreviewResponse>,
}

#[derive(Serialize)]
struct PreviewResponse {
    url: String,
    clip_id: uuid::Uuid,
    video_id: String,
    start_seconds: f64,
    end_seconds: f64,
    score: f32,
    visual_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    transcript: Option<String>,
}

impl From<Preview> for PreviewResponse {
    fn from(p: Preview) -> Self {
        Self {
            url: format!("/previews/{}", p.file_name),
            clip_id: p.clip_id,
            video_id: p.video_id,
            start_seconds: p.start_seconds,
            end_seconds: p.end_seconds,
            score: p.score,
            visual_description: p.visual_description,
            transcript: p.transcript,
        }
    }
}

#[derive(Serialize)]
struct VideoListResponse {
    videos: Vec<IndexedVideo>,
    total: usize,
}

#[derive(Serialize)]
struct VideoDetailResponse {
    #[serde(flatten)]
    video: IndexedVideo,
    clips: Vec<ClipRecord>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// A pipeline error rendered as a JSON response.
struct ApiError(KlippError);

impl From<KlippError> for ApiError {
    fn from(e: KlippError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn bad_request(msg: impl Into<String>) -> Self {
        Self(KlippError::InvalidInput(msg.into()))
    }
}

fn status_for(error: &KlippError) -> StatusCode {
    match error {
        KlippError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        KlippError::VideoNotFound(_) | KlippError::ClipNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            warn!("Request failed: {}", self.0);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// === Handlers ===

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let clips = state
        .orchestrator
        .vector_store()
        .clip_count()
        .await
        .unwrap_or(0);
    Json(serde_json::json!({ "status": "ok", "clips": clips }))
}

async fn upload_video(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<IngestResult> {
    let settings = state.orchestrator.settings();
    let mut force = false;
    let mut saved: Option<PathBuf> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "force" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
                force = matches!(value.trim(), "true" | "1" | "on");
            }
            "file" | "video" => {
                let file_name = field
                    .file_name()
                    .map(sanitize)
                    .ok_or_else(|| ApiError::bad_request("Upload has no file name"))?;
                if !is_supported(Path::new(&file_name), &settings.segmentation.supported_formats) {
                    return Err(ApiError::bad_request(format!(
                        "Unsupported video format: {} (supported: {})",
                        file_name,
                        settings.segmentation.supported_formats.join(", ")
                    )));
                }
                saved = Some(store_upload(&settings.upload_dir(), &file_name, field).await?);
            }
            _ => {}
        }
    }

    let path = saved.ok_or_else(|| ApiError::bad_request("No video file in upload"))?;
    info!("Received upload {}", path.display());

    let result = state
        .orchestrator
        .process_video(&path.to_string_lossy(), force, None)
        .await?;
    Ok(Json(result))
}

/// Stream an upload into a staging file chunk by chunk, then move it into place.
///
/// The staging file is deleted if the stream fails part way.
async fn store_upload<S, E>(dir: &Path, file_name: &str, chunks: S) -> crate::error::Result<PathBuf>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: std::fmt::Display,
{
    std::fs::create_dir_all(dir)?;
    let staged = tempfile::NamedTempFile::new_in(dir)?;
    let mut out = tokio::fs::File::from_std(staged.reopen()?);

    pin_mut!(chunks);
    let mut written = 0u64;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| KlippError::InvalidInput(format!("Upload interrupted: {}", e)))?;
        out.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    out.flush().await?;
    drop(out);

    let target = dir.join(file_name);
    staged.persist(&target).map_err(|e| e.error)?;
    info!("Stored upload {} ({} bytes)", target.display(), written);
    Ok(target)
}

async fn ingest_path(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> ApiResult<IngestResult> {
    let result = state
        .orchestrator
        .process_video(&req.path, req.force, None)
        .await?;
    Ok(Json(result))
}

async fn list_videos(State(state): State<Arc<AppState>>) -> ApiResult<VideoListResponse> {
    let videos = state.orchestrator.vector_store().list_videos().await?;
    Ok(Json(VideoListResponse {
        total: videos.len(),
        videos,
    }))
}

async fn get_video(
    State(state): State<Arc<AppState>>,
    UrlPath(video_id): UrlPath<String>,
) -> ApiResult<VideoDetailResponse> {
    let store = state.orchestrator.vector_store();
    let video = store
        .get_video(&video_id)
        .await?
        .ok_or(KlippError::VideoNotFound(video_id.clone()))?;
    let clips = store.get_clips(&video_id).await?;

    Ok(Json(VideoDetailResponse { video, clips }))
}

async fn get_clip(
    State(state): State<Arc<AppState>>,
    UrlPath(clip_id): UrlPath<Uuid>,
) -> ApiResult<ClipRecord> {
    let clip = state
        .orchestrator
        .vector_store()
        .get_clip(clip_id)
        .await?
        .ok_or(KlippError::ClipNotFound(clip_id.to_string()))?;
    Ok(Json(clip))
}

async fn remove_video(
    State(state): State<Arc<AppState>>,
    UrlPath(video_id): UrlPath<String>,
) -> ApiResult<RemoveResult> {
    let result = state.orchestrator.remove_video(&video_id).await?;
    Ok(Json(result))
}

async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<SearchResponse> {
    let results = state
        .orchestrator
        .search(&req.query, req.video_id.as_deref(), req.limit, req.min_score)
        .await?;

    Ok(Json(SearchResponse {
        results: results.into_iter().map(ContextClip::from).collect(),
    }))
}

async fn ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> ApiResult<AskResponse> {
    let answer = state
        .orchestrator
        .ask(&req.question, req.video_id.as_deref(), req.top_k)
        .await?;

    Ok(Json(AskResponse {
        answer: answer.answer,
        sources: answer.sources,
        previews: answer.previews.into_iter().map(PreviewResponse::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prompts;
    use crate::embedding::tests::FakeEmbedder;
    use crate::generation::tests::FakeGenerator;
    use crate::vector_store::tests::{clip, video};
    use crate::vector_store::{MemoryVectorStore, VectorStore};

    async fn state(dir: &Path) -> Arc<AppState> {
        let mut settings = Settings::default();
        settings.general.data_dir = dir.to_string_lossy().to_string();
        settings.preview.enabled = false;

        let store = Arc::new(MemoryVectorStore::new(2));
        store
            .index_video(
                &video("park.mp4"),
                &[
                    clip("park.mp4", 0, vec![1.0, 0.0]),
                    clip("park.mp4", 1, vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let orchestrator = Orchestrator::with_components(
            settings,
            Prompts::default(),
            Arc::new(FakeEmbedder::new(2).with("dog", vec![1.0, 0.0])),
            None,
            Arc::new(FakeGenerator::new("A dog runs.")),
            store,
        )
        .unwrap();

        Arc::new(AppState { orchestrator })
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&KlippError::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&KlippError::VideoNotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&KlippError::ClipNotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&KlippError::Generation("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_preview_url() {
        let preview = Preview {
            preview_path: PathBuf::from("/data/previews/result_1.gif"),
            file_name: "result_1.gif".to_string(),
            clip_id: uuid::Uuid::new_v4(),
            clip_path: "/clips/a.mp4".to_string(),
            video_id: "a.mp4".to_string(),
            start_seconds: 0.0,
            end_seconds: 30.0,
            score: 0.9,
            visual_description: "Scene".to_string(),
            transcript: None,
        };
        assert_eq!(PreviewResponse::from(preview).url, "/previews/result_1.gif");
    }

    #[tokio::test]
    async fn test_store_upload_streams_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let chunks = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"da")),
            Ok(Bytes::from_static(b"ta")),
        ]);

        let path = store_upload(dir.path(), "talk.mp4", chunks).await.unwrap();
        assert_eq!(path, dir.path().join("talk.mp4"));
        assert_eq!(std::fs::read(&path).unwrap(), b"data");
        // No staging files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_store_upload_discards_interrupted_stream() {
        let dir = tempfile::tempdir().unwrap();
        let chunks = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"da")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ]);

        let err = store_upload(dir.path(), "talk.mp4", chunks).await.unwrap_err();
        assert!(matches!(err, KlippError::InvalidInput(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_search_handler() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;

        let req = SearchRequest {
            query: "dog".to_string(),
            video_id: None,
            limit: 1,
            min_score: 0.0,
        };
        let Json(response) = search(State(state.clone()), Json(req)).await.ok().unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].video_id, "park.mp4");
        assert_eq!(response.results[0].timestamp, "00:00 - 00:30");

        let req = SearchRequest {
            query: "".to_string(),
            video_id: None,
            limit: 1,
            min_score: 0.0,
        };
        let err = search(State(state), Json(req)).await.err().unwrap();
        assert_eq!(status_for(&err.0), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ask_and_video_handlers() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;

        let req = AskRequest {
            question: "dog".to_string(),
            video_id: Some("park.mp4".to_string()),
            top_k: Some(2),
        };
        let Json(response) = ask(State(state.clone()), Json(req)).await.ok().unwrap();
        assert_eq!(response.answer, "A dog runs.");
        assert_eq!(response.sources.len(), 2);
        assert!(response.previews.is_empty());

        let Json(list) = list_videos(State(state.clone())).await.ok().unwrap();
        assert_eq!(list.total, 1);
        assert_eq!(list.videos[0].clip_count, 2);

        let Json(detail) = get_video(State(state.clone()), UrlPath("park.mp4".to_string()))
            .await
            .ok()
            .unwrap();
        assert_eq!(detail.clips.len(), 2);

        let clip_id = detail.clips[0].id;
        let Json(clip) = get_clip(State(state.clone()), UrlPath(clip_id))
            .await
            .ok()
            .unwrap();
        assert_eq!(clip.id, clip_id);
        assert_eq!(clip.video_id, "park.mp4");
        let err = get_clip(State(state.clone()), UrlPath(Uuid::new_v4()))
            .await
            .err()
            .unwrap();
        assert_eq!(status_for(&err.0), StatusCode::NOT_FOUND);

        let err = get_video(State(state), UrlPath("missing.mp4".to_string()))
            .await
            .err()
            .unwrap();
        assert_eq!(status_for(&err.0), StatusCode::NOT_FOUND);
    }
}
