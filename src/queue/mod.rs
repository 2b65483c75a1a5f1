//! Job queue scheduling.

mod scheduler;

pub use scheduler::{spawn_scheduler, QueueHandle};
