//! HTTP service

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use codepod::{ExecutionRequest, ExecutionResult, Runner, ValidationError};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub runner: Runner,
}

impl AppState {
    pub fn new(runner: Runner) -> Self {
        Self { runner }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/execute", post(execute))
        .route("/api/health", get(health))
        .route("/api/languages", get(languages))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until ctrl-c
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

/// Errors surfaced to HTTP callers
#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Internal,
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_owned(),
            ),
        };
        let body = ErrorBody {
            success: false,
            error,
        };
        (status, Json(body)).into_response()
    }
}

async fn execute(
    State(state): State<AppState>,
    payload: Result<Json<ExecutionRequest>, JsonRejection>,
) -> Result<Json<ExecutionResult>, ApiError> {
    let Json(request) = payload?;
    request.validate(&state.runner.config().bounds)?;

    // A panic inside the execution must not take the connection down with it
    let runner = state.runner.clone();
    let result = tokio::spawn(async move { runner.execute(&request).await })
        .await
        .map_err(|e| {
            error!(error = %e, "execution task failed");
            ApiError::Internal
        })?;

    Ok(Json(result))
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    timestamp: String,
    version: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
struct LanguageInfo {
    id: String,
    name: String,
    image: String,
    compiled: bool,
}

#[derive(Debug, Serialize)]
struct Languages {
    languages: Vec<LanguageInfo>,
}

async fn languages(State(state): State<AppState>) -> Json<Languages> {
    let config = state.runner.config();
    let languages = config
        .language_ids()
        .into_iter()
        .filter_map(|id| {
            config.languages.get(id).map(|lang| LanguageInfo {
                id: id.to_owned(),
                name: lang.name.clone(),
                image: lang.image.clone(),
                compiled: lang.is_compiled(),
            })
        })
        .collect();

    Json(Languages { languages })
}
