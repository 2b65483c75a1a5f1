//! Incremental ffmpeg stderr progress parsing.
//!
//! One [`EncodeProgress`] instance lives for the duration of a single
//! encoder invocation. It consumes the raw diagnostic stream in whatever
//! chunks the pipe delivers, extracts the total duration once and the
//! elapsed time as it advances, and keeps a bounded tail of raw lines for
//! failure diagnostics.

use std::collections::VecDeque;
use std::sync::OnceLock;

use regex::Regex;

/// Number of raw stderr lines retained for diagnostics.
const TAIL_LINES: usize = 50;

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2})(?:\.(\d+))?").unwrap())
}

fn time_hms_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"time=\s*(\d+):(\d{2}):(\d{2})(?:\.(\d+))?").unwrap())
}

fn time_secs_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"time=\s*(\d+(?:\.\d+)?)").unwrap())
}

/// Convert captured H/M/S(/fraction) groups to seconds.
fn captured_secs(caps: &regex::Captures) -> f64 {
    let hours: f64 = caps[1].parse().unwrap_or(0.0);
    let minutes: f64 = caps[2].parse().unwrap_or(0.0);
    let seconds: f64 = caps[3].parse().unwrap_or(0.0);
    let fraction = caps
        .get(4)
        .map(|m| {
            let digits = m.as_str();
            digits.parse::<f64>().unwrap_or(0.0) / 10f64.powi(digits.len() as i32)
        })
        .unwrap_or(0.0);
    hours * 3600.0 + minutes * 60.0 + seconds + fraction
}

/// Stateful per-invocation progress accumulator.
#[derive(Debug, Default)]
pub struct EncodeProgress {
    total_secs: Option<f64>,
    percent: Option<f64>,
    tail: VecDeque<String>,
    partial: String,
}

impl EncodeProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of stderr text.
    ///
    /// Returns the latest percentage computed from this chunk, or `None` if
    /// the chunk produced no new reading (e.g. the total duration is still
    /// unknown).
    pub fn push_chunk(&mut self, chunk: &str) -> Option<f64> {
        let mut emitted = None;

        // ffmpeg terminates status updates with '\r' and everything else
        // with '\n'; a chunk may end mid-line, so carry the remainder.
        self.partial.push_str(chunk);
        while let Some(pos) = self.partial.find(['\r', '\n']) {
            let line: String = self.partial.drain(..=pos).collect();
            if let Some(pct) = self.push_line(line.trim_end_matches(['\r', '\n'])) {
                emitted = Some(pct);
            }
        }

        emitted
    }

    /// Flush any trailing partial line into the diagnostic tail. Call once
    /// when the stream ends.
    pub fn finish(&mut self) {
        if !self.partial.is_empty() {
            let line = std::mem::take(&mut self.partial);
            self.remember(&line);
        }
    }

    /// The most recent percentage, if any was ever computed.
    pub fn percent(&self) -> Option<f64> {
        self.percent
    }

    /// The last `n` raw lines, joined with newlines.
    pub fn last_lines(&self, n: usize) -> String {
        let skip = self.tail.len().saturating_sub(n);
        self.tail
            .iter()
            .skip(skip)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn push_line(&mut self, line: &str) -> Option<f64> {
        if line.is_empty() {
            return None;
        }
        self.remember(line);

        if self.total_secs.is_none() {
            if let Some(caps) = duration_re().captures(line) {
                let total = captured_secs(&caps);
                if total > 0.0 {
                    self.total_secs = Some(total);
                }
                return None;
            }
        }

        // No percentage can be computed until the duration is known.
        let total = self.total_secs?;

        let elapsed = if let Some(caps) = time_hms_re().captures(line) {
            captured_secs(&caps)
        } else if let Some(caps) = time_secs_re().captures(line) {
            caps[1].parse().unwrap_or(0.0)
        } else {
            return None;
        };

        let pct = ((elapsed / total * 100.0).clamp(0.0, 100.0) * 10.0).round() / 10.0;
        self.percent = Some(pct);
        Some(pct)
    }

    fn remember(&mut self, line: &str) {
        self.tail.push_back(line.to_string());
        if self.tail.len() > TAIL_LINES {
            self.tail.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halfway_reports_fifty() {
        let mut p = EncodeProgress::new();
        assert_eq!(
            p.push_chunk("  Duration: 00:10:00.00, start: 0.000000, bitrate: 5000 kb/s\n"),
            None
        );
        let pct = p.push_chunk("frame= 7200 fps=48 time=00:05:00.00 bitrate=4800kbits/s\r");
        assert_eq!(pct, Some(50.0));
    }

    #[test]
    fn elapsed_beyond_duration_clamps() {
        let mut p = EncodeProgress::new();
        p.push_chunk("Duration: 00:01:00.00\n");
        let pct = p.push_chunk("time=00:02:30.00\r");
        assert_eq!(pct, Some(100.0));
    }

    #[test]
    fn nothing_emitted_before_duration() {
        let mut p = EncodeProgress::new();
        assert_eq!(p.push_chunk("time=00:05:00.00\r"), None);
        assert_eq!(p.percent(), None);
    }

    #[test]
    fn duration_is_never_overwritten() {
        let mut p = EncodeProgress::new();
        p.push_chunk("Duration: 00:10:00.00\n");
        // A second duration line (e.g. from a chapter header) must not win.
        p.push_chunk("Duration: 00:01:00.00\n");
        let pct = p.push_chunk("time=00:05:00.00\r");
        assert_eq!(pct, Some(50.0));
    }

    #[test]
    fn plain_seconds_fallback() {
        let mut p = EncodeProgress::new();
        p.push_chunk("Duration: 00:10:00.00\n");
        let pct = p.push_chunk("out_time_ms=... time=150.0 speed=2x\r");
        assert_eq!(pct, Some(25.0));
    }

    #[test]
    fn split_across_chunks() {
        let mut p = EncodeProgress::new();
        p.push_chunk("  Duration: 00:1");
        p.push_chunk("0:00.00, start: 0.0\n");
        assert_eq!(p.push_chunk("frame=1 time=00:0"), None);
        let pct = p.push_chunk("2:30.00 bitrate=1k\r");
        assert_eq!(pct, Some(25.0));
    }

    #[test]
    fn rounds_to_one_decimal() {
        let mut p = EncodeProgress::new();
        p.push_chunk("Duration: 00:03:00.00\n");
        // 61 / 180 = 33.888...%
        let pct = p.push_chunk("time=00:01:01.00\r");
        assert_eq!(pct, Some(33.9));
    }

    #[test]
    fn tail_is_bounded() {
        let mut p = EncodeProgress::new();
        for i in 0..200 {
            p.push_chunk(&format!("line {i}\n"));
        }
        let tail = p.last_lines(TAIL_LINES);
        assert!(tail.starts_with("line 150"));
        assert!(tail.ends_with("line 199"));
        assert_eq!(tail.lines().count(), TAIL_LINES);
    }

    #[test]
    fn last_lines_returns_requested_window() {
        let mut p = EncodeProgress::new();
        p.push_chunk("one\ntwo\nthree\n");
        assert_eq!(p.last_lines(2), "two\nthree");
    }

    #[test]
    fn finish_captures_trailing_partial() {
        let mut p = EncodeProgress::new();
        p.push_chunk("Conversion failed!");
        p.finish();
        assert_eq!(p.last_lines(1), "Conversion failed!");
    }
}
