//! Job management route handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use tcd_core::{JobId, JobStatus};
use tcd_db::pool::get_conn;
use tcd_db::queries::jobs;

use crate::server::AppError;
use crate::state::AppState;

/// GET /api/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
) -> Result<Json<Vec<tcd_db::models::Job>>, AppError> {
    let conn = get_conn(&state.pool)?;
    Ok(Json(jobs::list_jobs(&conn)?))
}

/// GET /api/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Result<Json<tcd_db::models::Job>, AppError> {
    let conn = get_conn(&state.pool)?;
    let job = jobs::get_job(&conn, id)?.ok_or_else(|| tcd_core::Error::not_found("job", id))?;
    Ok(Json(job))
}

/// DELETE /api/jobs/{id}
///
/// Running jobs cannot be deleted; stop them first (or use force-stop).
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Result<Json<Value>, AppError> {
    let conn = get_conn(&state.pool)?;
    let job = jobs::get_job(&conn, id)?.ok_or_else(|| tcd_core::Error::not_found("job", id))?;

    if job.status == JobStatus::Running {
        return Err(
            tcd_core::Error::Conflict("cannot delete a running job; stop it first".into()).into(),
        );
    }

    jobs::delete_job(&conn, id)?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/jobs/{id}/stop
pub async fn stop_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Result<Json<Value>, AppError> {
    {
        let conn = get_conn(&state.pool)?;
        jobs::get_job(&conn, id)?.ok_or_else(|| tcd_core::Error::not_found("job", id))?;
    }

    if state.queue.stop(id).await {
        Ok(Json(json!({ "success": true })))
    } else {
        Err(tcd_core::Error::Conflict("job is not queued or running".into()).into())
    }
}

/// POST /api/jobs/{id}/force-stop
///
/// Kills the encoder process if one is tracked and removes the job record
/// unconditionally.
pub async fn force_stop_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Result<Json<Value>, AppError> {
    {
        let conn = get_conn(&state.pool)?;
        jobs::get_job(&conn, id)?.ok_or_else(|| tcd_core::Error::not_found("job", id))?;
    }

    if state.queue.force_stop_and_remove(id).await {
        Ok(Json(json!({ "success": true })))
    } else {
        Err(tcd_core::Error::Internal("failed to force stop/remove job".into()).into())
    }
}
