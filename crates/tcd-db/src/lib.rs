//! SQLite-backed job store for transcodarr.
//!
//! The queue scheduler and the HTTP layer see jobs only through
//! [`queries::jobs`]; all schema knowledge lives in this crate.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;

pub use models::{Job, NewJob};
pub use pool::{get_conn, init_memory_pool, init_pool, DbPool};
