//! Job control endpoints.
//!
//! POST /api/uploads/:file_name       store a CSV dataset for the caller
//! POST /api/jobs                     start a job
//! GET  /api/jobs                     caller's running jobs
//! POST /api/jobs/:job_id/stop        request a cooperative stop
//! GET  /api/jobs/:job_id/download    current working copy

use axum::{
    body::Bytes,
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::common::JobId;
use crate::domains::cleanse::{ScrapeJob, StartJobRequest};
use crate::server::app::AxumAppState;
use crate::server::error::ApiError;
use crate::server::middleware::AuthOwner;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartJobResponse {
    pub job_id: JobId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopJobResponse {
    pub ok: bool,
    /// False when the job was already stopping or finished
    pub stop_requested: bool,
}

pub async fn upload_handler(
    Extension(state): Extension<AxumAppState>,
    AuthOwner(owner): AuthOwner,
    Path(file_name): Path<String>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    let file_name = state.service.upload(owner, &file_name, &body).await?;
    Ok(Json(UploadResponse { file_name }))
}

pub async fn start_job_handler(
    Extension(state): Extension<AxumAppState>,
    AuthOwner(owner): AuthOwner,
    Json(request): Json<StartJobRequest>,
) -> Result<(StatusCode, Json<StartJobResponse>), ApiError> {
    let job_id = state.service.start(owner, request).await?;
    Ok((StatusCode::CREATED, Json(StartJobResponse { job_id })))
}

pub async fn list_jobs_handler(
    Extension(state): Extension<AxumAppState>,
    AuthOwner(owner): AuthOwner,
) -> Result<Json<Vec<ScrapeJob>>, ApiError> {
    Ok(Json(state.service.list(owner).await?))
}

pub async fn stop_job_handler(
    Extension(state): Extension<AxumAppState>,
    AuthOwner(owner): AuthOwner,
    Path(job_id): Path<JobId>,
) -> Result<Json<StopJobResponse>, ApiError> {
    let stop_requested = state.service.stop(owner, job_id).await?;
    Ok(Json(StopJobResponse {
        ok: true,
        stop_requested,
    }))
}

pub async fn download_handler(
    Extension(state): Extension<AxumAppState>,
    AuthOwner(owner): AuthOwner,
    Path(job_id): Path<JobId>,
) -> Result<Response, ApiError> {
    let download = state.service.download(owner, job_id).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        download.file_name.replace('"', "")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.bytes,
    )
        .into_response())
}
