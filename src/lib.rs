//! transcodarr -- queue-based video transcoding server.
//!
//! The library half of the binary: the scheduler loop, the HTTP layer, the
//! file-browser operations and the shared application state. Domain types
//! live in `tcd-core`, the job store in `tcd-db` and all ffmpeg plumbing in
//! `tcd-av`.

pub mod files;
pub mod queue;
pub mod server;
pub mod state;
