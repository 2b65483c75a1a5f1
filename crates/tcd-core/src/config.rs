//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries all
//! sub-configs for server, media root, queue, encoding and tools. Every
//! section defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub media: MediaConfig,
    pub queue: QueueConfig,
    pub encode: EncodeConfig,
    pub tools: ToolsConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Apply environment overrides (`MEDIA_DIR`, `DATA_DIR`,
    /// `MAX_CONCURRENT_JOBS`), matching the container deployment contract.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("MEDIA_DIR") {
            if !dir.is_empty() {
                self.media.root = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var("DATA_DIR") {
            if !dir.is_empty() {
                self.server.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(n) = std::env::var("MAX_CONCURRENT_JOBS") {
            match n.parse::<usize>() {
                Ok(n) if n > 0 => self.queue.max_concurrent_jobs = n,
                _ => tracing::warn!("Ignoring invalid MAX_CONCURRENT_JOBS={n}"),
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.queue.max_concurrent_jobs == 0 {
            warnings.push("queue.max_concurrent_jobs is 0; no jobs will ever start".into());
        }

        if self.queue.tick_secs == 0 {
            warnings.push("queue.tick_secs is 0; the scheduler will busy-poll".into());
        }

        if let Some(w) = self.encode.scale_width {
            if w % 2 != 0 {
                warnings.push(format!(
                    "encode.scale_width {w} is odd; most encoders require even dimensions"
                ));
            }
        }

        warnings
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding the job database.
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// Media library settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Root directory all job inputs, outputs and file operations are
    /// confined to.
    pub root: PathBuf,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/media"),
        }
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of simultaneously running encodes.
    pub max_concurrent_jobs: usize,
    /// Scheduler poll interval in seconds.
    pub tick_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 1,
            tick_secs: 5,
        }
    }
}

/// Encoding defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    /// Optional downscale target width; height is auto-computed even.
    /// `None` keeps the source resolution.
    pub scale_width: Option<u32>,
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.media.root, PathBuf::from("/media"));
        assert_eq!(cfg.queue.max_concurrent_jobs, 1);
        assert_eq!(cfg.queue.tick_secs, 5);
        assert!(cfg.encode.scale_width.is_none());
    }

    #[test]
    fn default_config_no_warnings() {
        let warnings = Config::default().validate();
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn parse_json_config() {
        let json = r#"{"server": {"port": 9090}, "queue": {"max_concurrent_jobs": 3}}"#;
        let cfg = Config::from_json(json).unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.queue.max_concurrent_jobs, 3);
        // Unspecified sections keep their defaults.
        assert_eq!(cfg.queue.tick_secs, 5);
    }

    #[test]
    fn parse_empty_json_uses_defaults() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.server.port, 8080);
    }

    #[test]
    fn load_or_default_with_missing_file() {
        let cfg = Config::load_or_default(Some(Path::new("/nonexistent/config.json")));
        assert_eq!(cfg.server.port, 8080);
    }

    #[test]
    fn zero_concurrency_warns() {
        let mut cfg = Config::default();
        cfg.queue.max_concurrent_jobs = 0;
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("max_concurrent_jobs")));
    }

    #[test]
    fn odd_scale_width_warns() {
        let mut cfg = Config::default();
        cfg.encode.scale_width = Some(1279);
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("scale_width")));
    }
}
