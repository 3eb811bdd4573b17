//! # HTTP API
//!
//! Axum routes over a single shared [`PipelineRunner`].

pub mod config;
pub mod pipeline;

use axum::{
    body::Body,
    http::{header, Response, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use leadgen_core::{PipelineError, PipelineEvent, PipelineRunner, ScraperOptions};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use utoipa::{OpenApi, ToSchema};

use self::config::ConfigStore;

/// Application state
pub struct AppState {
    pub runner: PipelineRunner,
    pub event_tx: broadcast::Sender<PipelineEvent>,
    /// Persisted option defaults, merged under every start request
    pub defaults: RwLock<ScraperOptions>,
    pub store: ConfigStore,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire the runner's event channel into a broadcast for SSE subscribers
    pub fn new(runner: PipelineRunner, store: ConfigStore, defaults: ScraperOptions) -> SharedState {
        let (event_mpsc_tx, mut event_mpsc_rx) = mpsc::channel::<PipelineEvent>(256);
        let (event_tx, _) = broadcast::channel::<PipelineEvent>(256);

        let broadcast_tx = event_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = event_mpsc_rx.recv().await {
                let _ = broadcast_tx.send(event);
            }
        });

        Arc::new(Self {
            runner: runner.with_event_channel(event_mpsc_tx),
            event_tx,
            defaults: RwLock::new(defaults),
            store,
        })
    }
}

/// Error body for every failed request
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub error: String,
    pub kind: String,
    pub retryable: bool,
}

/// A pipeline error rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub PipelineError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            PipelineError::Config(_) => StatusCode::BAD_REQUEST,
            PipelineError::AlreadyRunning => StatusCode::CONFLICT,
            PipelineError::Acquisition(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = ApiErrorBody {
            error: self.0.to_string(),
            kind: self.0.kind().as_str().to_string(),
            retryable: self.0.is_retryable(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Leadgen API",
        version = "1.0.0",
        description = "API for the lead acquisition pipeline"
    ),
    paths(
        pipeline::start_pipeline,
        pipeline::cancel_pipeline,
        pipeline::get_progress,
        pipeline::get_results,
        config::get_config,
        config::update_config
    ),
    components(
        schemas(
            ApiErrorBody,
            pipeline::StartResponse,
            pipeline::CancelResponse,
            pipeline::ProgressResponse,
            pipeline::ResultsResponse,
            config::ConfigResponse,
            config::ConfigDefaults
        )
    ),
    tags(
        (name = "pipeline", description = "Run control and results"),
        (name = "config", description = "Persisted option defaults")
    )
)]
pub struct ApiDoc;

async fn serve_openapi() -> impl IntoResponse {
    match ApiDoc::openapi().to_json() {
        Ok(spec) => Response::builder()
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(spec))
            .map(IntoResponse::into_response)
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(e) => {
            tracing::error!("Failed to render OpenAPI document: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn router(state: SharedState) -> Router {
    let pipeline_routes = Router::new()
        .route("/start", post(pipeline::start_pipeline))
        .route("/cancel", post(pipeline::cancel_pipeline))
        .route("/progress", get(pipeline::get_progress))
        .route("/results", get(pipeline::get_results))
        .route("/events", get(pipeline::events));

    Router::new()
        .nest("/api/v1/pipeline", pipeline_routes)
        .route(
            "/api/v1/config",
            get(config::get_config).patch(config::update_config),
        )
        .route("/api/v1/openapi.json", get(serve_openapi))
        .with_state(state)
}
