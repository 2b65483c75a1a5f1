//! System status route handlers.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use tcd_av::tools::ToolInfo;

use crate::server::AppError;
use crate::state::AppState;

/// GET /api/hw-status
///
/// Capability snapshot: which hardware backends are usable, which codecs
/// each supports, and the platform-preferred pick. The first call triggers
/// the (cached) probe.
pub async fn hw_status(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let caps = state.capabilities.get(&state.tools).await;

    let backends: Vec<Value> = caps
        .available_backends()
        .into_iter()
        .map(|hw| {
            let codecs: Vec<&str> = tcd_core::Codec::all()
                .iter()
                .filter(|&&codec| caps.supports(hw, codec))
                .map(|codec| codec.as_str())
                .collect();
            json!({ "backend": hw.as_str(), "codecs": codecs })
        })
        .collect();

    Ok(Json(json!({
        "available": caps.any_available(),
        "preferred": caps.preferred().map(|hw| hw.as_str()),
        "backends": backends,
    })))
}

/// GET /api/tools
pub async fn tools(State(state): State<AppState>) -> Result<Json<Vec<ToolInfo>>, AppError> {
    Ok(Json(state.tools.check_all()))
}
