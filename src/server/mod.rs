//! Axum HTTP layer.
//!
//! JSON API only; the scheduler and the stores do the real work. Routes are
//! grouped per resource with thin handlers on top of the library modules.

mod error;
mod routes_encode;
mod routes_files;
mod routes_jobs;
mod routes_system;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use error::AppError;

/// Build the complete application router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // Jobs
        .route("/jobs", get(routes_jobs::list_jobs))
        .route("/jobs/{id}", get(routes_jobs::get_job))
        .route("/jobs/{id}", delete(routes_jobs::delete_job))
        .route("/jobs/{id}/stop", post(routes_jobs::stop_job))
        .route("/jobs/{id}/force-stop", post(routes_jobs::force_stop_job))
        // Submission
        .route("/encode", post(routes_encode::submit_encode))
        // File browser
        .route("/files", get(routes_files::list_files))
        .route("/files/rename", post(routes_files::rename_file))
        .route("/files/paste", post(routes_files::paste_file))
        .route("/files/delete", post(routes_files::delete_file))
        // System
        .route("/hw-status", get(routes_system::hw_status))
        .route("/tools", get(routes_system::tools));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{addr}");

    let router = build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
