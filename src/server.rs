//! HTTP query boundary.
//!
//! Exposes the QA pipeline as a small JSON API:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a question from the indexed documents |
//! | `GET`  | `/health` | Health check |
//!
//! `POST /ask` takes `{"question": "..."}` and returns
//! `{"answer", "sources", "num_chunks", "execution_time"}`. Pipeline
//! failures map to an error body — the server never fabricates an
//! answer on failure.
//!
//! All origins, methods, and headers are permitted so browser-based
//! clients can call the API directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::PipelineError;
use crate::query::QaPipeline;

/// Shared state passed to route handlers.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<QaPipeline>,
}

/// Start the HTTP server on the configured bind address.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config, pipeline: Arc<QaPipeline>) -> anyhow::Result<()> {
    let state = AppState { pipeline };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("docqa server listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

/// JSON error response body.
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
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        let (status, code) = match &e {
            PipelineError::Configuration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration")
            }
            PipelineError::Embedding(_) => (StatusCode::BAD_GATEWAY, "embedding_failed"),
            PipelineError::Generation(_) => (StatusCode::BAD_GATEWAY, "generation_failed"),
            PipelineError::Retrieval(_) => (StatusCode::BAD_GATEWAY, "retrieval_failed"),
            PipelineError::IngestionFile { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        AppError {
            status,
            code,
            message: e.to_string(),
        }
    }
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = req.question.trim();
    if question.len() < 3 {
        return Err(AppError {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: "question must be at least 3 characters".to_string(),
        });
    }

    let outcome = state.pipeline.ask(question).await?;
    Ok(Json(outcome))
}

async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}
