//! Job submission, status, cancellation, and listing.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use transcoder_models::{Job, JobId, JobState};

use crate::dispatcher::SubmitJobRequest;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// POST /jobs
pub async fn submit_job(
    State(state): State<AppState>,
    Json(req): Json<SubmitJobRequest>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    if req.job_id.trim().is_empty() {
        return Err(ApiError::bad_request("job_id must not be empty"));
    }
    let job = state.dispatcher.submit(req).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /jobs/:job_id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job = state
        .jobs
        .get_job(&JobId::from_string(job_id.clone()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {job_id} not found")))?;
    Ok(Json(job))
}

/// POST /jobs/:job_id/cancel
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.jobs.cancel_job(&JobId::from_string(job_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default)]
    pub state: Option<String>,
}

/// GET /jobs?state=queued
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<Vec<Job>>> {
    let filter = query
        .state
        .as_deref()
        .map(|s| s.parse::<JobState>())
        .transpose()
        .map_err(ApiError::bad_request)?;
    let jobs = state.jobs.list_jobs(filter).await?;
    Ok(Json(jobs))
}
