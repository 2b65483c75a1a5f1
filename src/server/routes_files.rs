//! File-browser route handlers.

use std::path::PathBuf;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::files::{self, FileEntry, PasteMode};
use crate::server::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// Directory to list; defaults to the media root.
    pub path: Option<PathBuf>,
}

/// GET /api/files
pub async fn list_files(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<FileEntry>>, AppError> {
    let root = &state.config.media.root;
    let path = params.path.unwrap_or_else(|| root.clone());
    let entries = files::list_dir(root, &state.tools, &path).await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub path: PathBuf,
    pub new_name: String,
}

/// POST /api/files/rename
pub async fn rename_file(
    State(state): State<AppState>,
    Json(payload): Json<RenameRequest>,
) -> Result<Json<Value>, AppError> {
    let new_path = files::rename_entry(&state.config.media.root, &payload.path, &payload.new_name)?;
    Ok(Json(json!({ "success": true, "path": new_path })))
}

#[derive(Debug, Deserialize)]
pub struct PasteRequest {
    pub source: PathBuf,
    pub target_dir: PathBuf,
    pub mode: PasteMode,
}

/// POST /api/files/paste
pub async fn paste_file(
    State(state): State<AppState>,
    Json(payload): Json<PasteRequest>,
) -> Result<Json<Value>, AppError> {
    let target = files::paste_entry(
        &state.config.media.root,
        &payload.source,
        &payload.target_dir,
        payload.mode,
    )
    .await?;
    Ok(Json(json!({ "success": true, "path": target })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub path: PathBuf,
}

/// POST /api/files/delete
pub async fn delete_file(
    State(state): State<AppState>,
    Json(payload): Json<DeleteRequest>,
) -> Result<Json<Value>, AppError> {
    files::delete_entry(&state.config.media.root, &payload.path)?;
    Ok(Json(json!({ "success": true })))
}
