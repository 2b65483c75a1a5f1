//! Shared application state.
//!
//! [`AppState`] is handed to every route handler via Axum state. It wraps
//! immutable infrastructure in `Arc`s; all mutable job state lives behind
//! the scheduler's command channel or in the database.

use std::sync::Arc;

use tcd_av::capability::CapabilityCache;
use tcd_av::tools::ToolRegistry;
use tcd_core::config::Config;
use tcd_db::pool::DbPool;

use crate::queue::QueueHandle;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub queue: QueueHandle,
    pub tools: Arc<ToolRegistry>,
    pub capabilities: Arc<CapabilityCache>,
}
