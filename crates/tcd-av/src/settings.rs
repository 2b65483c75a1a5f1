//! Codec/settings mapping and output-path derivation.
//!
//! Pure functions: the exhaustive table from (codec, hardware backend,
//! quality) to an ffmpeg encoder and its quality arguments, plus the
//! deterministic output and temp path rules.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tcd_core::{Codec, HwAccel};

/// Output container used for every encode.
const OUTPUT_EXTENSION: &str = "mkv";

/// Resolved encoder invocation fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    /// ffmpeg `-c:v` value.
    pub video_codec: &'static str,
    /// Encoder-specific quality/preset arguments.
    pub options: Vec<String>,
}

/// The ffmpeg encoder identifier for a hardware backend and codec, if that
/// combination exists at all.
pub fn hw_encoder_name(codec: Codec, hw: HwAccel) -> Option<&'static str> {
    match (codec, hw) {
        (Codec::X264, HwAccel::Nvenc) => Some("h264_nvenc"),
        (Codec::X265, HwAccel::Nvenc) => Some("hevc_nvenc"),
        (Codec::Av1, HwAccel::Nvenc) => Some("av1_nvenc"),
        (Codec::X264, HwAccel::Qsv) => Some("h264_qsv"),
        (Codec::X265, HwAccel::Qsv) => Some("hevc_qsv"),
        (Codec::Av1, HwAccel::Qsv) => Some("av1_qsv"),
        (Codec::X264, HwAccel::Videotoolbox) => Some("h264_videotoolbox"),
        (Codec::X265, HwAccel::Videotoolbox) => Some("hevc_videotoolbox"),
        // ffmpeg has no av1_videotoolbox encoder.
        (Codec::Av1, HwAccel::Videotoolbox) => None,
    }
}

impl EncoderSettings {
    /// Map (codec, hardware-or-none, quality) to an encoder invocation.
    ///
    /// A software path exists for every codec; a hardware combination absent
    /// from the table falls back to the software row.
    pub fn resolve(codec: Codec, hw: Option<HwAccel>, quality: u32) -> Self {
        let Some(hw) = hw else {
            return Self::software(codec, quality);
        };

        let Some(video_codec) = hw_encoder_name(codec, hw) else {
            return Self::software(codec, quality);
        };

        let q = quality.to_string();
        let options = match hw {
            HwAccel::Nvenc => vec!["-cq".into(), q, "-preset".into(), "medium".into()],
            HwAccel::Qsv => vec![
                "-global_quality".into(),
                q,
                "-preset".into(),
                "medium".into(),
            ],
            HwAccel::Videotoolbox => vec!["-q:v".into(), q],
        };

        Self {
            video_codec,
            options,
        }
    }

    fn software(codec: Codec, quality: u32) -> Self {
        let q = quality.to_string();
        match codec {
            Codec::X264 => Self {
                video_codec: "libx264",
                options: vec!["-crf".into(), q, "-preset".into(), "medium".into()],
            },
            Codec::X265 => Self {
                video_codec: "libx265",
                options: vec!["-crf".into(), q, "-preset".into(), "medium".into()],
            },
            Codec::Av1 => Self {
                video_codec: "libsvtav1",
                options: vec!["-crf".into(), q, "-preset".into(), "8".into()],
            },
        }
    }
}

/// Codec token already present in a file stem, delimited by `_`, `-`, `.`,
/// whitespace or brackets.
fn codec_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?P<pre>^|[\s._\-\[\(])(?P<tok>x264|h264|x265|h265|av1)(?P<post>$|[\s._\-\]\)])")
            .unwrap()
    })
}

/// Derive the output path for an input file and target codec.
///
/// If the file stem already carries a codec token it is replaced in place
/// (`movie_x265.mkv` + x264 -> `movie_h264.mkv`); otherwise a bracketed
/// suffix is appended (`clip.mkv` + x265 -> `clip [h265].mkv`). The output
/// always lives next to the input and always uses the mkv container. If the
/// derived name would collide with the input itself (the stem already names
/// the target codec), the bracketed suffix is used instead.
pub fn derive_output_path(input: &Path, codec: Codec) -> PathBuf {
    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");

    let token = codec.file_token();
    let replaced = codec_token_re().replace(stem, |caps: &regex::Captures| {
        format!("{}{}{}", &caps["pre"], token, &caps["post"])
    });

    let candidate = if replaced != stem {
        dir.join(format!("{replaced}.{OUTPUT_EXTENSION}"))
    } else {
        dir.join(format!("{stem} [{token}].{OUTPUT_EXTENSION}"))
    };

    if candidate == input {
        dir.join(format!("{stem} [{token}].{OUTPUT_EXTENSION}"))
    } else {
        candidate
    }
}

/// Staging path for an in-progress encode: same directory and extension as
/// the final output with a `.tmp` marker, so the finishing rename stays on
/// one filesystem.
pub fn temp_output_path(output: &Path) -> PathBuf {
    let dir = output.parent().unwrap_or_else(|| Path::new(""));
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let ext = output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or(OUTPUT_EXTENSION);
    dir.join(format!("{stem}.tmp.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn software_rows() {
        let s = EncoderSettings::resolve(Codec::X264, None, 23);
        assert_eq!(s.video_codec, "libx264");
        assert_eq!(s.options, vec!["-crf", "23", "-preset", "medium"]);

        let s = EncoderSettings::resolve(Codec::X265, None, 28);
        assert_eq!(s.video_codec, "libx265");

        let s = EncoderSettings::resolve(Codec::Av1, None, 35);
        assert_eq!(s.video_codec, "libsvtav1");
        assert_eq!(s.options, vec!["-crf", "35", "-preset", "8"]);
    }

    #[test]
    fn nvenc_rows() {
        let s = EncoderSettings::resolve(Codec::X264, Some(HwAccel::Nvenc), 24);
        assert_eq!(s.video_codec, "h264_nvenc");
        assert_eq!(s.options, vec!["-cq", "24", "-preset", "medium"]);

        let s = EncoderSettings::resolve(Codec::Av1, Some(HwAccel::Nvenc), 24);
        assert_eq!(s.video_codec, "av1_nvenc");
    }

    #[test]
    fn qsv_rows() {
        let s = EncoderSettings::resolve(Codec::X265, Some(HwAccel::Qsv), 26);
        assert_eq!(s.video_codec, "hevc_qsv");
        assert_eq!(s.options[0], "-global_quality");
    }

    #[test]
    fn videotoolbox_rows() {
        let s = EncoderSettings::resolve(Codec::X264, Some(HwAccel::Videotoolbox), 30);
        assert_eq!(s.video_codec, "h264_videotoolbox");
        assert_eq!(s.options, vec!["-q:v", "30"]);
    }

    #[test]
    fn absent_hw_combination_falls_back_to_software() {
        let s = EncoderSettings::resolve(Codec::Av1, Some(HwAccel::Videotoolbox), 30);
        assert_eq!(s.video_codec, "libsvtav1");
    }

    #[test]
    fn output_path_replaces_existing_token() {
        let out = derive_output_path(Path::new("/media/movie_x265.mkv"), Codec::X264);
        assert_eq!(out, PathBuf::from("/media/movie_h264.mkv"));
    }

    #[test]
    fn output_path_appends_suffix_without_token() {
        let out = derive_output_path(Path::new("/media/clip.mkv"), Codec::X265);
        assert_eq!(out, PathBuf::from("/media/clip [h265].mkv"));
    }

    #[test]
    fn output_path_replaces_bracketed_token() {
        let out = derive_output_path(Path::new("/media/show [h265].mkv"), Codec::Av1);
        assert_eq!(out, PathBuf::from("/media/show [av1].mkv"));
    }

    #[test]
    fn output_path_is_case_insensitive() {
        let out = derive_output_path(Path::new("/media/Movie.X264.mp4"), Codec::X265);
        assert_eq!(out, PathBuf::from("/media/Movie.h265.mkv"));
    }

    #[test]
    fn output_path_ignores_token_inside_words() {
        // "max264plus" has no delimiter around the token; leave it alone.
        let out = derive_output_path(Path::new("/media/max264plus.mkv"), Codec::X265);
        assert_eq!(out, PathBuf::from("/media/max264plus [h265].mkv"));
    }

    #[test]
    fn output_path_never_equals_input() {
        // Input already named after the target codec.
        let out = derive_output_path(Path::new("/media/movie_h264.mkv"), Codec::X264);
        assert_eq!(out, PathBuf::from("/media/movie_h264 [h264].mkv"));
    }

    #[test]
    fn output_path_always_mkv() {
        let out = derive_output_path(Path::new("/media/clip.mp4"), Codec::X264);
        assert_eq!(out, PathBuf::from("/media/clip [h264].mkv"));
    }

    #[test]
    fn temp_path_keeps_directory_and_extension() {
        let tmp = temp_output_path(Path::new("/media/movie_h264.mkv"));
        assert_eq!(tmp, PathBuf::from("/media/movie_h264.tmp.mkv"));
    }
}
