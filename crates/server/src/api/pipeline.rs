//! # Pipeline API
//!
//! Start, cancel and observe runs. The runner keeps its own run slot, so a
//! second start while one is in flight comes back as `409`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream};
use leadgen_core::pipeline::{FailureInfo, StageRecord};
use leadgen_core::{
    Lead, LeadQuery, LeadSummary, PipelineState, ScraperOptions, SearchType, StageKind,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use utoipa::{IntoParams, ToSchema};

use super::{ApiError, ApiErrorBody, SharedState};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub run_id: String,
    #[schema(value_type = String)]
    pub state: PipelineState,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CancelResponse {
    /// Whether a run was in flight to receive the signal
    pub cancelled: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub progress: u8,
    pub running: bool,
    #[schema(value_type = String)]
    pub state: PipelineState,
    #[schema(value_type = Option<String>)]
    pub stage: Option<StageKind>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultsResponse {
    pub run_id: Option<String>,
    #[schema(value_type = String)]
    pub state: PipelineState,
    #[schema(value_type = Option<Object>)]
    pub failure: Option<FailureInfo>,
    /// Leads in the run, before any query narrowing
    pub total_leads: usize,
    #[schema(value_type = Vec<Object>)]
    pub leads: Vec<Lead>,
    /// Summary of the returned leads
    #[schema(value_type = Object)]
    pub summary: LeadSummary,
    #[schema(value_type = Vec<Object>)]
    pub stages: Vec<StageRecord>,
}

/// Display-time narrowing of `/results`
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ResultsParams {
    /// Free text matched against company, name or title
    pub q: Option<String>,
    /// Restrict `q` to one field: company, name or title
    #[param(value_type = Option<String>)]
    pub search_type: Option<SearchType>,
    #[serde(default)]
    pub verified_only: bool,
    pub min_score: Option<u8>,
}

impl From<ResultsParams> for LeadQuery {
    fn from(params: ResultsParams) -> Self {
        LeadQuery {
            text: params.q,
            search_type: params.search_type,
            verified_only: params.verified_only,
            min_score: params.min_score,
        }
    }
}

/// Start a run; the body is merged over the persisted defaults
#[utoipa::path(
    post,
    path = "/api/v1/pipeline/start",
    tag = "pipeline",
    request_body(content = Object, description = "ScraperOptions (camelCase)"),
    responses(
        (status = 202, description = "Run started", body = StartResponse),
        (status = 400, description = "Invalid options", body = ApiErrorBody),
        (status = 409, description = "A run is already in flight", body = ApiErrorBody)
    )
)]
pub async fn start_pipeline(
    State(state): State<SharedState>,
    Json(req): Json<ScraperOptions>,
) -> Result<(StatusCode, Json<StartResponse>), ApiError> {
    let mut options = state.defaults.read().await.clone();
    options.merge(req);

    // the run task is detached; its outcome lands in the runner's snapshot
    let _handle = state.runner.spawn(&options)?;
    let snapshot = state.runner.results();
    tracing::info!(run_id = ?snapshot.run_id, "Run accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(StartResponse {
            run_id: snapshot.run_id.clone().unwrap_or_default(),
            state: snapshot.state,
        }),
    ))
}

/// Request cancellation of the in-flight run
#[utoipa::path(
    post,
    path = "/api/v1/pipeline/cancel",
    tag = "pipeline",
    responses(
        (status = 200, description = "Cancellation requested", body = CancelResponse)
    )
)]
pub async fn cancel_pipeline(State(state): State<SharedState>) -> Json<CancelResponse> {
    Json(CancelResponse {
        cancelled: state.runner.cancel(),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/pipeline/progress",
    tag = "pipeline",
    responses(
        (status = 200, description = "Current progress", body = ProgressResponse)
    )
)]
pub async fn get_progress(State(state): State<SharedState>) -> Json<ProgressResponse> {
    let progress = state.runner.progress();
    let snapshot = state.runner.results();
    Json(ProgressResponse {
        progress: progress.progress,
        running: progress.running,
        state: snapshot.state,
        stage: snapshot.stage,
    })
}

/// Current or final leads of the latest run
#[utoipa::path(
    get,
    path = "/api/v1/pipeline/results",
    tag = "pipeline",
    params(ResultsParams),
    responses(
        (status = 200, description = "Run snapshot", body = ResultsResponse)
    )
)]
pub async fn get_results(
    State(state): State<SharedState>,
    Query(params): Query<ResultsParams>,
) -> Json<ResultsResponse> {
    let snapshot = state.runner.results();
    let query = LeadQuery::from(params);
    let leads: Vec<Lead> = query.apply(&snapshot.leads).into_iter().cloned().collect();

    Json(ResultsResponse {
        run_id: snapshot.run_id.clone(),
        state: snapshot.state,
        failure: snapshot.failure.clone(),
        total_leads: snapshot.leads.len(),
        summary: LeadSummary::of(&leads),
        leads,
        stages: snapshot.stages.clone(),
    })
}

/// SSE endpoint for pipeline events with heartbeat
pub async fn events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.event_tx.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            let next = tokio::time::timeout(std::time::Duration::from_secs(15), rx.recv()).await;
            return match next {
                Ok(Ok(event)) => {
                    let json = serde_json::to_string(&event).unwrap_or_default();
                    Some((Ok(Event::default().event(event_name(&event)).data(json)), rx))
                }
                Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped))) => {
                    tracing::debug!(skipped, "SSE subscriber lagged");
                    continue;
                }
                Ok(Err(_)) => None,
                Err(_) => Some((Ok(Event::default().comment("heartbeat")), rx)),
            };
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn event_name(event: &leadgen_core::PipelineEvent) -> &'static str {
    use leadgen_core::PipelineEventKind::*;
    match event.kind {
        RunStarted => "run_started",
        StageStarted => "stage_started",
        BatchAcquired => "batch_acquired",
        StageCompleted => "stage_completed",
        RunCompleted => "run_completed",
        RunFailed => "run_failed",
    }
}
