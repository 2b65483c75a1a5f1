//! Encode submission route handler.

use std::path::Path;
use std::str::FromStr;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use tcd_av::settings::derive_output_path;
use tcd_core::paths::resolve_within_root;
use tcd_core::types::QUALITY_RANGE;
use tcd_core::Codec;
use tcd_db::models::NewJob;
use tcd_db::pool::get_conn;
use tcd_db::queries::jobs;

use crate::server::AppError;
use crate::state::AppState;

fn default_true() -> bool {
    true
}

/// Request body for submitting encode jobs.
#[derive(Debug, Deserialize)]
pub struct EncodeRequest {
    /// Input files, absolute or relative to the media root.
    pub files: Vec<String>,
    pub codec: String,
    /// Constant-quality value.
    #[serde(alias = "cq")]
    pub quality: u32,
    /// Request hardware encoding; corrected to false at start time when no
    /// backend is available.
    #[serde(default = "default_true")]
    pub use_hardware: bool,
    /// Delete the source file after a validated successful encode.
    #[serde(default)]
    pub auto_delete_source: bool,
}

/// Per-file rejection detail.
#[derive(Debug, Serialize)]
pub struct FileError {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct EncodeResponse {
    pub jobs: Vec<tcd_db::models::Job>,
    pub errors: Vec<FileError>,
}

/// POST /api/encode
///
/// Creates one queued job per accepted file. Individual file failures are
/// reported alongside the created jobs; the request as a whole fails only
/// when no job could be created.
pub async fn submit_encode(
    State(state): State<AppState>,
    Json(payload): Json<EncodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.files.is_empty() {
        return Err(tcd_core::Error::Validation("no files provided".into()).into());
    }

    let codec = Codec::from_str(&payload.codec)?;

    if !QUALITY_RANGE.contains(&payload.quality) {
        return Err(tcd_core::Error::Validation(format!(
            "quality {} out of range ({}..={})",
            payload.quality,
            QUALITY_RANGE.start(),
            QUALITY_RANGE.end()
        ))
        .into());
    }

    let root = &state.config.media.root;
    let mut created = Vec::new();
    let mut errors = Vec::new();

    for file in &payload.files {
        match prepare_job(root, file, codec, &payload) {
            Ok(new_job) => {
                let conn = get_conn(&state.pool)?;
                match jobs::create_job(&conn, &new_job) {
                    Ok(job) => created.push(job),
                    Err(e) => errors.push(FileError {
                        path: file.clone(),
                        error: e.to_string(),
                    }),
                }
            }
            Err(e) => errors.push(FileError {
                path: file.clone(),
                error: e.to_string(),
            }),
        }
    }

    if created.is_empty() {
        return Err(
            tcd_core::Error::Validation("no valid jobs could be created".into()).into(),
        );
    }

    tracing::info!(count = created.len(), "Encode jobs created");

    Ok((
        StatusCode::CREATED,
        Json(EncodeResponse {
            jobs: created,
            errors,
        }),
    ))
}

/// Validate one input file and build its job spec.
fn prepare_job(
    root: &Path,
    file: &str,
    codec: Codec,
    payload: &EncodeRequest,
) -> tcd_core::Result<NewJob> {
    let input = resolve_within_root(root, Path::new(file))?;

    let meta = std::fs::metadata(&input)?;
    if !meta.is_file() {
        return Err(tcd_core::Error::Validation(format!(
            "{} is not a regular file",
            input.display()
        )));
    }

    let output = derive_output_path(&input, codec);
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".into());

    Ok(NewJob {
        filename,
        input_path: input.to_string_lossy().into_owned(),
        output_path: output.to_string_lossy().into_owned(),
        codec,
        quality: payload.quality,
        requested_hw: payload.use_hardware,
        auto_delete_source: payload.auto_delete_source,
        input_size: Some(meta.len() as i64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(quality: u32) -> EncodeRequest {
        EncodeRequest {
            files: vec!["movie.mkv".into()],
            codec: "x265".into(),
            quality,
            use_hardware: true,
            auto_delete_source: false,
        }
    }

    #[test]
    fn prepare_job_derives_paths() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("movie.mkv");
        std::fs::write(&input, b"0123456789").unwrap();

        let new_job = prepare_job(dir.path(), "movie.mkv", Codec::X265, &request(24)).unwrap();
        assert_eq!(new_job.filename, "movie.mkv");
        assert!(new_job.output_path.ends_with("movie [h265].mkv"));
        assert_ne!(new_job.input_path, new_job.output_path);
        assert_eq!(new_job.input_size, Some(10));
        assert!(new_job.requested_hw);
    }

    #[test]
    fn prepare_job_rejects_escaping_path() {
        let dir = tempfile::tempdir().unwrap();
        let result = prepare_job(dir.path(), "../outside.mkv", Codec::X264, &request(24));
        assert!(matches!(result, Err(tcd_core::Error::PathDenied(_))));
    }

    #[test]
    fn prepare_job_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("folder")).unwrap();
        let result = prepare_job(dir.path(), "folder", Codec::X264, &request(24));
        assert!(matches!(result, Err(tcd_core::Error::Validation(_))));
    }

    #[test]
    fn request_accepts_cq_alias() {
        let json = r#"{"files": ["a.mkv"], "codec": "x264", "cq": 23}"#;
        let req: EncodeRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.quality, 23);
        assert!(req.use_hardware);
        assert!(!req.auto_delete_source);
    }
}
