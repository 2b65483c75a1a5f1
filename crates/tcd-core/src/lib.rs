//! Core types shared by every transcodarr crate.
//!
//! Carries the unified error type, the typed job id, the domain enums
//! (codec, hardware backend, job status) and the application configuration.

pub mod config;
pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::JobId;
pub use types::{Codec, HwAccel, JobStatus};
