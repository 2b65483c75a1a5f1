//! Domain enums: target codec, hardware backend, job status.
//!
//! All three round-trip through the lowercase text stored in the database
//! and carried in API payloads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::Error;

/// Accepted constant-quality range across all encoders.
pub const QUALITY_RANGE: RangeInclusive<u32> = 18..=51;

/// Target video codec for an encoding job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    X264,
    X265,
    Av1,
}

impl Codec {
    /// Database / API text form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::X264 => "x264",
            Codec::X265 => "x265",
            Codec::Av1 => "av1",
        }
    }

    /// Filename token used when deriving output paths (`movie_h264.mkv`).
    pub fn file_token(&self) -> &'static str {
        match self {
            Codec::X264 => "h264",
            Codec::X265 => "h265",
            Codec::Av1 => "av1",
        }
    }

    /// All known codecs, in submission-form order.
    pub fn all() -> &'static [Codec] {
        &[Codec::X264, Codec::X265, Codec::Av1]
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Codec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x264" => Ok(Codec::X264),
            "x265" => Ok(Codec::X265),
            "av1" => Ok(Codec::Av1),
            other => Err(Error::Validation(format!(
                "unknown codec '{other}' (expected x264, x265 or av1)"
            ))),
        }
    }
}

/// Hardware encoder backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HwAccel {
    Nvenc,
    Qsv,
    Videotoolbox,
}

impl HwAccel {
    /// Database / API text form.
    pub fn as_str(&self) -> &'static str {
        match self {
            HwAccel::Nvenc => "nvenc",
            HwAccel::Qsv => "qsv",
            HwAccel::Videotoolbox => "videotoolbox",
        }
    }

    /// All known backends.
    pub fn all() -> &'static [HwAccel] {
        &[HwAccel::Nvenc, HwAccel::Qsv, HwAccel::Videotoolbox]
    }
}

impl fmt::Display for HwAccel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HwAccel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nvenc" => Ok(HwAccel::Nvenc),
            "qsv" => Ok(HwAccel::Qsv),
            "videotoolbox" => Ok(HwAccel::Videotoolbox),
            other => Err(Error::Validation(format!(
                "unknown hardware backend '{other}'"
            ))),
        }
    }
}

/// Lifecycle state of an encoding job.
///
/// Transitions are monotonic: `queued -> running -> {completed, failed,
/// cancelled}`, plus the direct `queued -> cancelled` shortcut. Terminal
/// states have no outgoing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Database / API text form.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Whether this state has no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match self {
            JobStatus::Queued => matches!(next, JobStatus::Running | JobStatus::Cancelled),
            JobStatus::Running => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(Error::Internal(format!("unknown job status '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_text_roundtrip() {
        for codec in Codec::all() {
            let parsed: Codec = codec.as_str().parse().unwrap();
            assert_eq!(parsed, *codec);
        }
        assert!("mpeg2".parse::<Codec>().is_err());
    }

    #[test]
    fn codec_file_tokens() {
        assert_eq!(Codec::X264.file_token(), "h264");
        assert_eq!(Codec::X265.file_token(), "h265");
        assert_eq!(Codec::Av1.file_token(), "av1");
    }

    #[test]
    fn hw_text_roundtrip() {
        for hw in HwAccel::all() {
            let parsed: HwAccel = hw.as_str().parse().unwrap();
            assert_eq!(parsed, *hw);
        }
        assert!("vaapi".parse::<HwAccel>().is_err());
    }

    #[test]
    fn status_serde_lowercase() {
        let json = serde_json::to_string(&JobStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
    }

    #[test]
    fn queued_transitions() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Cancelled));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn running_transitions() {
        assert!(JobStatus::Running.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Cancelled));
        assert!(!JobStatus::Running.can_transition_to(JobStatus::Queued));
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in [
                JobStatus::Queued,
                JobStatus::Running,
                JobStatus::Completed,
                JobStatus::Failed,
                JobStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn quality_range_bounds() {
        assert!(QUALITY_RANGE.contains(&18));
        assert!(QUALITY_RANGE.contains(&51));
        assert!(!QUALITY_RANGE.contains(&17));
        assert!(!QUALITY_RANGE.contains(&52));
    }
}
