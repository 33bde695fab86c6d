//! HTTP API for the course assistant.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/query` | Answer a question within a session |
//! | `GET`  | `/api/courses` | Course count and titles |
//! | `DELETE` | `/api/sessions/{id}` | Forget a session (204) |
//! | `GET`  | `/health`, `/` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Handler errors use a JSON body:
//!
//! ```json
//! { "error": { "code": "invalid_request", "message": "missing field `query`" } }
//! ```
//!
//! Error codes: `invalid_request` (422, body is not valid JSON or lacks
//! `query`), `query_failed` (500), `internal` (500). An empty `query` is
//! passed through to the assistant.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser frontend
//! served from another origin can call the API.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::rag::{CourseAnalytics, QueryResponse, RagSystem};

/// Shared state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    rag: Arc<RagSystem>,
}

/// Starts the HTTP server on `[server].bind`.
///
/// Loads the configured documents folder first when
/// `[documents].load_on_startup` is set; courses already indexed are
/// skipped. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let rag = Arc::new(RagSystem::from_config(config.clone()).await?);

    if config.documents.load_on_startup {
        load_startup_documents(&rag).await;
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("course assistant listening on http://{}", bind_addr);
    axum::serve(listener, router(rag)).await?;

    Ok(())
}

async fn load_startup_documents(rag: &RagSystem) {
    let folder = &rag.config().documents.folder;
    if !folder.is_dir() {
        tracing::warn!(folder = %folder.display(), "documents folder not found, starting without loading");
        return;
    }
    match rag.add_course_folder(None, false).await {
        Ok(report) => tracing::info!(
            added = report.courses_added,
            skipped = report.courses_skipped,
            chunks = report.chunks_added,
            "startup documents loaded"
        ),
        Err(e) => tracing::warn!("failed to load startup documents: {:#}", e),
    }
}

/// Build the application router around an existing [`RagSystem`].
pub fn router(rag: Arc<RagSystem>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/query", post(handle_query))
        .route("/api/courses", get(handle_courses))
        .route("/api/sessions/{id}", delete(handle_clear_session))
        .route("/health", get(handle_health))
        .route("/", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { rag })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            code: "invalid_request".to_string(),
            message: rejection.body_text(),
        }
    }
}

fn server_error(code: &str, err: anyhow::Error) -> AppError {
    tracing::error!("{}: {:#}", code, err);
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: code.to_string(),
        message: format!("{:#}", err),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    session_id: Option<String>,
}

async fn handle_query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(req) = body?;
    let response = state
        .rag
        .query(&req.query, req.session_id.as_deref())
        .await
        .map_err(|e| server_error("query_failed", e))?;

    Ok(Json(response))
}

// ============ GET /api/courses ============

async fn handle_courses(State(state): State<AppState>) -> Result<Json<CourseAnalytics>, AppError> {
    let analytics = state
        .rag
        .course_analytics()
        .await
        .map_err(|e| server_error("internal", e))?;
    Ok(Json(analytics))
}

// ============ DELETE /api/sessions/{id} ============

/// Idempotent: unknown ids also answer 204.
async fn handle_clear_session(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if !state.rag.sessions().clear_session(&id).await {
        tracing::debug!(session_id = %id, "clear requested for unknown session");
    }
    StatusCode::NO_CONTENT
}
