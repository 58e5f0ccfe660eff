//! Discovery job endpoints
//!
//! Start and retry spawn the pipeline as a detached tokio task and return
//! immediately; clients poll the job endpoints for progress.

use crate::db::jobs;
use crate::error::{ApiError, ApiResult};
use crate::models::DiscoveryJob;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct StartJobRequest {
    pub region: String,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

/// POST /discovery/start
pub async fn start_job(
    State(state): State<AppState>,
    Json(request): Json<StartJobRequest>,
) -> ApiResult<(StatusCode, Json<DiscoveryJob>)> {
    let region = request.region.trim();
    if region.is_empty() {
        return Err(ApiError::BadRequest("Region must not be empty".to_string()));
    }

    let job = DiscoveryJob::new(region.to_string());
    jobs::save_job(&state.db, &job).await.map_err(ApiError::from)?;

    tracing::info!(job_id = %job.job_id, region = %job.region, "Discovery job accepted");
    spawn_run(&state, job.job_id);

    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// GET /discovery/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListJobsParams>,
) -> ApiResult<Json<Vec<DiscoveryJob>>> {
    if params.limit < 1 || params.limit > 100 {
        return Err(ApiError::BadRequest(
            "limit must be between 1 and 100".to_string(),
        ));
    }
    if params.offset < 0 {
        return Err(ApiError::BadRequest("offset must not be negative".to_string()));
    }

    let jobs = jobs::list_jobs(&state.db, params.limit, params.offset)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(jobs))
}

/// GET /discovery/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<DiscoveryJob>> {
    let job = jobs::load_job(&state.db, job_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("Job {} not found", job_id)))?;
    Ok(Json(job))
}

/// DELETE /discovery/jobs/{id}
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let removed = jobs::delete_job(&state.db, job_id)
        .await
        .map_err(ApiError::from)?;
    if !removed {
        return Err(ApiError::NotFound(format!("Job {} not found", job_id)));
    }
    Ok(Json(json!({"message": "Job deleted successfully"})))
}

/// POST /discovery/jobs/{id}/retry
pub async fn retry_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<DiscoveryJob>)> {
    let mut job = jobs::load_job(&state.db, job_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("Job {} not found", job_id)))?;

    if !job.is_terminal() {
        return Err(ApiError::BadRequest(
            "Only completed or failed jobs can be retried".to_string(),
        ));
    }

    job.reset_for_retry();
    jobs::save_job(&state.db, &job).await.map_err(ApiError::from)?;

    tracing::info!(job_id = %job.job_id, region = %job.region, "Discovery job retry accepted");
    spawn_run(&state, job.job_id);

    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// GET /discovery/status/overview
pub async fn overview(State(state): State<AppState>) -> ApiResult<Json<jobs::JobOverview>> {
    let overview = jobs::overview(&state.db).await.map_err(ApiError::from)?;
    Ok(Json(overview))
}

fn spawn_run(state: &AppState, job_id: Uuid) {
    let runner = state.runner.clone();
    tokio::spawn(async move {
        runner.run(job_id).await;
    });
}
