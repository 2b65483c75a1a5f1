//! Encoding job queue operations.
//!
//! Every update is field-scoped so concurrent writers never clobber columns
//! they did not set, and status changes are guarded by the current status so
//! the `queued -> running -> terminal` machine cannot move backwards.

use chrono::Utc;
use rusqlite::Connection;
use tcd_core::{Error, HwAccel, JobId, Result};

use crate::models::{Job, NewJob};

const COLS: &str = "id, filename, input_path, output_path, codec, quality,
    requested_hw, hw_kind, auto_delete_source, status, progress,
    input_size, output_size, error_message, created_at, started_at, completed_at";

/// Create a new job in state `queued`.
pub fn create_job(conn: &Connection, new: &NewJob) -> Result<Job> {
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO jobs (filename, input_path, output_path, codec, quality,
            requested_hw, auto_delete_source, status, input_size, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'queued', ?8, ?9)",
        rusqlite::params![
            new.filename,
            new.input_path,
            new.output_path,
            new.codec.as_str(),
            new.quality as i64,
            new.requested_hw as i64,
            new.auto_delete_source as i64,
            new.input_size,
            &now,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    let id = JobId::new(conn.last_insert_rowid());
    get_job(conn, id)?.ok_or_else(|| Error::Internal(format!("job {id} vanished after insert")))
}

/// Get a job by ID.
pub fn get_job(conn: &Connection, id: JobId) -> Result<Option<Job>> {
    let q = format!("SELECT {COLS} FROM jobs WHERE id = ?1");
    let result = conn.query_row(&q, [id.as_i64()], Job::from_row);
    match result {
        Ok(j) => Ok(Some(j)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List all jobs, newest first.
pub fn list_jobs(conn: &Connection) -> Result<Vec<Job>> {
    let q = format!("SELECT {COLS} FROM jobs ORDER BY id DESC");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], Job::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// The oldest queued job, if any.
pub fn next_queued_job(conn: &Connection) -> Result<Option<Job>> {
    let q = format!(
        "SELECT {COLS} FROM jobs WHERE status = 'queued'
         ORDER BY created_at ASC, id ASC LIMIT 1"
    );
    let result = conn.query_row(&q, [], Job::from_row);
    match result {
        Ok(j) => Ok(Some(j)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// All jobs currently marked running.
pub fn running_jobs(conn: &Connection) -> Result<Vec<Job>> {
    let q = format!("SELECT {COLS} FROM jobs WHERE status = 'running' ORDER BY id ASC");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], Job::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Count of jobs currently marked running.
pub fn count_running(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM jobs WHERE status = 'running'",
        [],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Move a queued job to `running`, stamping `started_at` and the resolved
/// hardware backend. Returns false if the job was not queued.
pub fn mark_running(conn: &Connection, id: JobId, hw_kind: Option<HwAccel>) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE jobs SET status = 'running', started_at = ?1, hw_kind = ?2
             WHERE id = ?3 AND status = 'queued'",
            rusqlite::params![&now, hw_kind.map(|h| h.as_str()), id.as_i64()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Persist that hardware was requested but is not available, so the job ran
/// (and will show as having run) in software.
pub fn clear_requested_hw(conn: &Connection, id: JobId) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE jobs SET requested_hw = 0 WHERE id = ?1",
            [id.as_i64()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Update encode progress for a running job.
pub fn update_progress(conn: &Connection, id: JobId, progress: f64) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE jobs SET progress = ?1 WHERE id = ?2 AND status = 'running'",
            rusqlite::params![progress, id.as_i64()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Mark a running job completed, with full progress and the output size.
pub fn complete_job(conn: &Connection, id: JobId, output_size: i64) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE jobs SET status = 'completed', progress = 100.0,
                output_size = ?1, completed_at = ?2
             WHERE id = ?3 AND status = 'running'",
            rusqlite::params![output_size, &now, id.as_i64()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Mark a running job failed with an error message.
pub fn fail_job(conn: &Connection, id: JobId, error: &str) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE jobs SET status = 'failed', error_message = ?1, completed_at = ?2
             WHERE id = ?3 AND status = 'running'",
            rusqlite::params![error, &now, id.as_i64()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Cancel a queued or running job. Returns false for terminal jobs.
pub fn cancel_job(conn: &Connection, id: JobId) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE jobs SET status = 'cancelled', completed_at = ?1
             WHERE id = ?2 AND status IN ('queued', 'running')",
            rusqlite::params![&now, id.as_i64()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Delete a job record unconditionally. Returns true if a row was deleted.
pub fn delete_job(conn: &Connection, id: JobId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM jobs WHERE id = ?1", [id.as_i64()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Re-queue jobs left `running` by a previous process instance.
///
/// A fresh scheduler can never reattach to a foreign encoder process, so
/// anything still marked running at startup is stale. Returns the number of
/// jobs reset.
pub fn reset_orphaned_jobs(conn: &Connection) -> Result<usize> {
    let n = conn
        .execute(
            "UPDATE jobs SET status = 'queued', progress = 0.0,
                started_at = NULL, hw_kind = NULL
             WHERE status = 'running'",
            [],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n)
}
