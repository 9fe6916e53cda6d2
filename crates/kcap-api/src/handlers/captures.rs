//! Capture job handlers.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;
use validator::Validate;

use kcap_models::{CaptureId, CaptureJob, CaptureRequest};

use crate::error::{ApiError, ApiResult};
use crate::security::ensure_label_safe;
use crate::services::{DeleteJobResponse, JobFilter, StartJobResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CaptureJobListResponse {
    pub jobs: Vec<CaptureJob>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub userid: String,
    #[serde(default)]
    pub jobid: String,
    #[serde(default)]
    pub index: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub userid: String,
}

/// Launch a capture job for each requested URL.
///
/// `POST /captures` → 201 with the count of jobs actually submitted.
pub async fn start_capture_jobs(
    State(state): State<AppState>,
    Json(request): Json<CaptureRequest>,
) -> ApiResult<(StatusCode, Json<StartJobResponse>)> {
    request.validate()?;
    let response = state.orchestrator.start_job(&request).await;
    Ok((StatusCode::CREATED, Json(response)))
}

/// List capture jobs, optionally filtered by owner and identity.
///
/// `GET /captures?userid=&jobid=&index=`
pub async fn list_capture_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<CaptureJobListResponse>> {
    ensure_label_safe("userid", &query.userid)?;
    ensure_label_safe("jobid", &query.jobid)?;

    let filter = JobFilter {
        userid: Some(query.userid),
        jobid: Some(query.jobid),
        index: query.index,
    };
    let jobs = state.orchestrator.list_jobs(&filter).await?;
    Ok(Json(CaptureJobListResponse { jobs }))
}

/// Delete a capture job and its archive.
///
/// `DELETE /capture/{id}?userid=`. A supplied userid must match the
/// job's owner; mismatches look exactly like a missing job.
pub async fn delete_capture_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<DeleteJobResponse>> {
    let Ok(id) = id.parse::<CaptureId>() else {
        return Ok(Json(DeleteJobResponse { deleted: false }));
    };
    let userid = (!query.userid.is_empty()).then_some(query.userid.as_str());
    let response = state.orchestrator.delete_job(&id, userid).await?;
    Ok(Json(response))
}

/// Proxy the finished archive from the worker.
///
/// `GET /capture/{id}/download` → archive bytes, or 404 while the worker
/// has nothing to serve yet.
pub async fn download_capture(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id: CaptureId = id
        .parse()
        .map_err(|_| ApiError::not_found("no such capture job"))?;

    match state.worker.fetch_archive(&id.job_name()).await {
        Ok(Some(bytes)) => Ok((
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response()),
        Ok(None) => Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "not_yet_ready"})),
        )
            .into_response()),
        Err(e) => {
            warn!(job = %id, error = %e, "Failed to reach worker for download");
            Err(ApiError::upstream("capture worker is unreachable"))
        }
    }
}
