//! FFprobe media metadata.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format
//! -show_streams` and maps the JSON output into the small [`MediaMetadata`]
//! record the file browser displays.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// Probe timeout: listing a directory should never hang on one file.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Summary metadata for a media file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaMetadata {
    /// Container duration in seconds.
    pub duration: Option<f64>,
    /// Primary video stream codec name.
    pub video_codec: Option<String>,
    /// Primary video stream resolution, `WxH`.
    pub resolution: Option<String>,
    /// Container bit rate in bits per second.
    pub bit_rate: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Probe a file for display metadata.
///
/// Returns `None` when the file is not media ffprobe understands (or
/// ffprobe is unavailable) -- a directory listing must never fail because
/// one entry is opaque.
pub async fn probe_metadata(tools: &ToolRegistry, path: &Path) -> Option<MediaMetadata> {
    let ffprobe = tools.require("ffprobe").ok()?.clone();

    let output = ToolCommand::new(ffprobe)
        .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path.to_string_lossy())
        .timeout(PROBE_TIMEOUT)
        .execute()
        .await
        .ok()?;

    parse_ffprobe_output(&output.stdout)
}

/// Parse ffprobe JSON into [`MediaMetadata`]; `None` if there is no video
/// stream.
pub fn parse_ffprobe_output(json: &str) -> Option<MediaMetadata> {
    let ff: FfprobeOutput = serde_json::from_str(json).ok()?;

    let video = ff
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))?;

    let resolution = match (video.width, video.height) {
        (Some(w), Some(h)) => Some(format!("{w}x{h}")),
        _ => None,
    };

    Some(MediaMetadata {
        duration: ff.format.duration.as_deref().and_then(|d| d.parse().ok()),
        video_codec: video.codec_name.clone(),
        resolution,
        bit_rate: ff.format.bit_rate.as_deref().and_then(|b| b.parse().ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"codec_type": "audio", "codec_name": "aac"},
            {"codec_type": "video", "codec_name": "hevc", "width": 1920, "height": 1080}
        ],
        "format": {"duration": "4210.52", "bit_rate": "5012345"}
    }"#;

    #[test]
    fn parses_video_metadata() {
        let meta = parse_ffprobe_output(SAMPLE).unwrap();
        assert_eq!(meta.video_codec.as_deref(), Some("hevc"));
        assert_eq!(meta.resolution.as_deref(), Some("1920x1080"));
        assert_eq!(meta.bit_rate, Some(5012345));
        assert!((meta.duration.unwrap() - 4210.52).abs() < f64::EPSILON);
    }

    #[test]
    fn no_video_stream_is_none() {
        let json = r#"{"streams": [{"codec_type": "audio", "codec_name": "mp3"}], "format": {}}"#;
        assert!(parse_ffprobe_output(json).is_none());
    }

    #[test]
    fn invalid_json_is_none() {
        assert!(parse_ffprobe_output("not json").is_none());
    }

    #[test]
    fn missing_fields_tolerated() {
        let json = r#"{"streams": [{"codec_type": "video"}]}"#;
        let meta = parse_ffprobe_output(json).unwrap();
        assert!(meta.video_codec.is_none());
        assert!(meta.resolution.is_none());
        assert!(meta.duration.is_none());
    }

    #[tokio::test]
    async fn probe_without_ffprobe_is_none() {
        let tools = ToolRegistry::with_paths([]);
        assert!(probe_metadata(&tools, Path::new("/tmp/x.mkv")).await.is_none());
    }
}
