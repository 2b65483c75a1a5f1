//! External encoder tooling for transcodarr.
//!
//! Wraps everything that touches ffmpeg/ffprobe: tool discovery, capability
//! probing, codec argument mapping, output-path derivation, incremental
//! progress parsing and the per-job encode supervisor.

pub mod capability;
pub mod command;
pub mod encode;
pub mod probe;
pub mod progress;
pub mod settings;
pub mod tools;

pub use capability::{Capabilities, CapabilityCache};
pub use command::{ToolCommand, ToolOutput};
pub use encode::{EncodeEvent, EncodeHandle, EncodeOutcome, EncodeSpec};
pub use progress::EncodeProgress;
pub use settings::{derive_output_path, temp_output_path, EncoderSettings};
pub use tools::{ToolInfo, ToolRegistry};
