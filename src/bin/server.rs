//! Cogmap Server: HTTP API for AI-generated mind maps.
//!
//! Thin axum server over `cogmap_lib::MindMapService`. Every route is
//! scoped by a user id in the path; the store keeps users apart.
//!
//! Usage:
//!   COGMAP_DB=/path/to/cogmap.db COGMAP_BIND=127.0.0.1:3741 cogmap-server
//!
//! Or with args:
//!   cogmap-server --db /path/to/cogmap.db --bind 0.0.0.0:3741 --config settings.json

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use cogmap_lib::ai_client::{generator_from_settings, GenerateRequest, VoiceCommand};
use cogmap_lib::db::{Database, DetailLevel, MapSummary, NodeSummary, Note};
use cogmap_lib::export::ExportFormat;
use cogmap_lib::service::LoadedMap;
use cogmap_lib::settings::Settings;
use cogmap_lib::utils::setup_logging;
use cogmap_lib::{CogmapError, MindMapService, TreeLayout};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

/// Uploaded PDFs and long transcripts both fit under this.
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

// ============================================================================
// AppState
// ============================================================================

#[derive(Clone)]
struct AppState {
    service: MindMapService,
    db: Arc<Database>,
    start_time: Instant,
}

// ============================================================================
// Error type
// ============================================================================

struct AppError(StatusCode, String, &'static str);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({"error": self.1, "kind": self.2}))).into_response()
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError(StatusCode::INTERNAL_SERVER_ERROR, s, "internal")
    }
}

impl From<CogmapError> for AppError {
    fn from(e: CogmapError) -> Self {
        let status = match &e {
            CogmapError::NotFound(_) => StatusCode::NOT_FOUND,
            CogmapError::InvalidInput(_) | CogmapError::Pdf(_) => StatusCode::BAD_REQUEST,
            CogmapError::Unbuildable | CogmapError::TooDeep { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            CogmapError::Ai(_) => StatusCode::BAD_GATEWAY,
            CogmapError::Storage(_) | CogmapError::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(kind = e.kind(), "{}", e);
        }
        AppError(status, e.to_string(), e.kind())
    }
}

fn bad_request(msg: impl Into<String>) -> AppError {
    AppError(StatusCode::BAD_REQUEST, msg.into(), "invalid_input")
}

// ============================================================================
// Request / Response types
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailQuery {
    detail_level: Option<String>,
}

impl DetailQuery {
    fn detail_level(&self) -> Result<DetailLevel, AppError> {
        match self.detail_level.as_deref() {
            None => Ok(DetailLevel::default()),
            Some(raw) => DetailLevel::from_str(raw)
                .ok_or_else(|| bad_request(format!("Unknown detail level '{}'", raw))),
        }
    }
}

#[derive(Deserialize)]
struct ExportQuery {
    format: Option<String>,
}

#[derive(Deserialize)]
struct NoteRequest {
    content: String,
}

#[derive(Deserialize)]
struct ChatRequest {
    question: String,
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
}

#[derive(Deserialize)]
struct VoiceRequest {
    transcript: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    generator: String,
    uptime_secs: u64,
}

// ============================================================================
// Map handlers
// ============================================================================

// POST /users/{user}/maps
async fn generate_handler(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(req): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<LoadedMap>), AppError> {
    let loaded = state.service.generate(&user, req).await?;
    Ok((StatusCode::CREATED, Json(loaded)))
}

// POST /users/{user}/maps/pdf?detailLevel=simplest
async fn generate_pdf_handler(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Query(params): Query<DetailQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<LoadedMap>), AppError> {
    if body.is_empty() {
        return Err(bad_request("Request body must contain the PDF file"));
    }
    let detail_level = params.detail_level()?;
    let loaded = state.service.generate_from_pdf(&user, &body, detail_level).await?;
    Ok((StatusCode::CREATED, Json(loaded)))
}

// GET /users/{user}/maps
async fn list_maps_handler(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<Vec<MapSummary>>, AppError> {
    Ok(Json(state.service.list(&user)?))
}

// GET /users/{user}/maps/{map}
async fn get_map_handler(
    State(state): State<AppState>,
    Path((user, map_id)): Path<(String, String)>,
) -> Result<Json<LoadedMap>, AppError> {
    Ok(Json(state.service.load(&user, &map_id)?))
}

// DELETE /users/{user}/maps/{map}
async fn delete_map_handler(
    State(state): State<AppState>,
    Path((user, map_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state.service.delete(&user, &map_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /users/{user}/maps/{map}/layout
async fn layout_handler(
    State(state): State<AppState>,
    Path((user, map_id)): Path<(String, String)>,
) -> Result<Json<TreeLayout>, AppError> {
    Ok(Json(state.service.layout(&user, &map_id)?))
}

// GET /users/{user}/maps/{map}/export?format=csv
async fn export_handler(
    State(state): State<AppState>,
    Path((user, map_id)): Path<(String, String)>,
    Query(params): Query<ExportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let raw = params.format.as_deref().unwrap_or("json");
    let format = ExportFormat::from_str(raw)
        .ok_or_else(|| bad_request(format!("Unknown export format '{}' (json, csv, svg)", raw)))?;

    let file = state.service.export(&user, &map_id, format)?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.mime_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", header_safe(&file.file_name)),
            ),
        ],
        file.body,
    ))
}

/// Header values must be visible ASCII; anything else becomes `_`.
fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect()
}

// ============================================================================
// Node handlers
// ============================================================================

// POST /users/{user}/maps/{map}/nodes/{node}/summary?detailLevel=simplest
async fn summary_handler(
    State(state): State<AppState>,
    Path((user, map_id, node_id)): Path<(String, String, String)>,
    Query(params): Query<DetailQuery>,
) -> Result<Json<NodeSummary>, AppError> {
    let detail_level = params.detail_level()?;
    let summary = state.service.summarize(&user, &map_id, &node_id, detail_level).await?;
    Ok(Json(summary))
}

// GET /users/{user}/maps/{map}/nodes/{node}/note
async fn get_note_handler(
    State(state): State<AppState>,
    Path((user, map_id, node_id)): Path<(String, String, String)>,
) -> Result<Json<Note>, AppError> {
    Ok(Json(state.service.note(&user, &map_id, &node_id)?))
}

// PUT /users/{user}/maps/{map}/nodes/{node}/note
async fn put_note_handler(
    State(state): State<AppState>,
    Path((user, map_id, node_id)): Path<(String, String, String)>,
    Json(req): Json<NoteRequest>,
) -> Result<Json<Note>, AppError> {
    Ok(Json(state.service.save_note(&user, &map_id, &node_id, &req.content)?))
}

// GET /users/{user}/maps/{map}/notes
async fn list_notes_handler(
    State(state): State<AppState>,
    Path((user, map_id)): Path<(String, String)>,
) -> Result<Json<Vec<Note>>, AppError> {
    Ok(Json(state.service.notes(&user, &map_id)?))
}

// ============================================================================
// Chat and voice
// ============================================================================

// POST /users/{user}/maps/{map}/chat
async fn chat_handler(
    State(state): State<AppState>,
    Path((user, map_id)): Path<(String, String)>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let answer = state.service.chat(&user, &map_id, &req.question).await?;
    Ok(Json(ChatResponse { answer }))
}

// POST /voice-command
async fn voice_handler(
    State(state): State<AppState>,
    Json(req): Json<VoiceRequest>,
) -> Result<Json<VoiceCommand>, AppError> {
    Ok(Json(state.service.voice_command(&req.transcript).await?))
}

// ============================================================================
// Operational
// ============================================================================

// GET /snapshot
async fn snapshot_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let temp_path = std::env::temp_dir().join(format!("cogmap-snapshot-{}.db", uuid::Uuid::new_v4()));
    let temp_str = temp_path.to_string_lossy().to_string();

    state.db.backup_to(&temp_str)
        .map_err(|e| AppError::from(format!("Backup failed: {}", e)))?;

    let bytes = tokio::fs::read(&temp_path).await
        .map_err(|e| AppError::from(format!("Failed to read backup: {}", e)))?;

    tokio::fs::remove_file(&temp_path).await.ok();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"cogmap-snapshot.db\""),
        ],
        bytes,
    ))
}

// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        generator: state.service.generator_name().to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

// ============================================================================
// Router
// ============================================================================

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/snapshot", get(snapshot_handler))
        .route("/voice-command", post(voice_handler))
        .route("/users/{user}/maps", post(generate_handler).get(list_maps_handler))
        .route("/users/{user}/maps/pdf", post(generate_pdf_handler))
        .route("/users/{user}/maps/{map}", get(get_map_handler).delete(delete_map_handler))
        .route("/users/{user}/maps/{map}/layout", get(layout_handler))
        .route("/users/{user}/maps/{map}/export", get(export_handler))
        .route("/users/{user}/maps/{map}/notes", get(list_notes_handler))
        .route("/users/{user}/maps/{map}/chat", post(chat_handler))
        .route("/users/{user}/maps/{map}/nodes/{node}/summary", post(summary_handler))
        .route(
            "/users/{user}/maps/{map}/nodes/{node}/note",
            get(get_note_handler).put(put_note_handler),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    setup_logging("info");

    // Parse simple args (no clap to keep binary small)
    let args: Vec<String> = std::env::args().collect();
    let mut db_arg: Option<&str> = None;
    let mut bind_arg: Option<&str> = None;
    let mut config_arg: Option<&str> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" if i + 1 < args.len() => {
                db_arg = Some(&args[i + 1]);
                i += 2;
            }
            "--bind" if i + 1 < args.len() => {
                bind_arg = Some(&args[i + 1]);
                i += 2;
            }
            "--config" if i + 1 < args.len() => {
                config_arg = Some(&args[i + 1]);
                i += 2;
            }
            "--help" | "-h" => {
                println!("cogmap-server - Mind map HTTP API");
                println!();
                println!("Usage: cogmap-server [--db PATH] [--bind ADDR:PORT] [--config PATH]");
                println!();
                println!("Environment variables:");
                println!("  COGMAP_DB            Database path");
                println!("  COGMAP_BIND          Bind address (default: 127.0.0.1:3741)");
                println!("  COGMAP_LLM_BACKEND   anthropic | ollama");
                println!("  ANTHROPIC_API_KEY    Key for the anthropic backend");
                println!("  RUST_LOG             Log filter (default: info)");
                std::process::exit(0);
            }
            other => {
                tracing::warn!(arg = other, "Ignoring unknown argument");
                i += 1;
            }
        }
    }

    let mut settings = Settings::resolve(config_arg.map(std::path::Path::new));
    if let Some(db) = db_arg {
        settings.db_path = Some(db.to_string());
    }
    if let Some(bind) = bind_arg {
        settings.bind_addr = bind.to_string();
    }

    let db_path: PathBuf = settings.db_path();
    tracing::info!(path = %db_path.display(), "Opening database");

    let db = match Database::new(&db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            tracing::error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    let generator = generator_from_settings(&settings);
    tracing::info!(backend = generator.name(), "Text generator ready");

    let state = AppState {
        service: MindMapService::new(db.clone(), generator, settings.layout),
        db,
        start_time: Instant::now(),
    };

    let listener = match tokio::net::TcpListener::bind(&settings.bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", settings.bind_addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Listening on {}", settings.bind_addr);
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutting down");
    };
    if let Err(e) = axum::serve(listener, app(state)).with_graceful_shutdown(shutdown).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
