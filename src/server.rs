//! JSON HTTP API over the question-answering pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service banner with version and endpoint list |
//! | `GET`  | `/health` | Readiness, index statistics, and startup error |
//! | `POST` | `/ask` | Answer a question: `{ "question": "..." }` |
//!
//! # Error Contract
//!
//! All error responses share one shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_ready` (503),
//! `service_unavailable` (503), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front-ends
//! can call the API directly.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::context::{AppContext, HealthReport};
use crate::error::RagError;
use crate::rag::AnswerKind;

/// Build the router with all routes and the CORS layer.
///
/// Exposed separately from [`run_server`] so tests can drive it in-process.
pub fn router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/ask", post(handle_ask))
        .layer(cors)
        .with_state(ctx)
}

/// Bind to `bind` and serve until Ctrl-C.
pub async fn run_server(ctx: Arc<AppContext>, bind: &str) -> anyhow::Result<()> {
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(bind, "HTTP server listening");
    println!("docrag listening on http://{}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`).
    code: &'static str,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_ready(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "not_ready",
        message: message.into(),
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Gateway { .. } => AppError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                code: "service_unavailable",
                message: err.to_string(),
            },
            other => {
                tracing::error!(error = %other, "request failed");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal",
                    message: other.to_string(),
                }
            }
        }
    }
}

// ============ GET / ============

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
    version: &'static str,
    endpoints: Vec<&'static str>,
}

async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Document question answering API",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec!["GET /", "GET /health", "POST /ask"],
    })
}

// ============ GET /health ============

/// Always 200; readiness is reported in the body.
async fn handle_health(State(ctx): State<Arc<AppContext>>) -> Json<HealthReport> {
    Json(ctx.health())
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    kind: AnswerKind,
}

async fn handle_ask(
    State(ctx): State<Arc<AppContext>>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;

    // Readiness is reported before any question validation.
    let Some(pipeline) = ctx.pipeline() else {
        let reason = ctx.init_error().unwrap_or("initialization did not complete");
        return Err(not_ready(format!("RAG system not ready: {}", reason)));
    };

    if req.question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let answer = pipeline.ask(&req.question).await?;
    Ok(Json(AskResponse {
        answer: answer.text,
        kind: answer.kind,
    }))
}
