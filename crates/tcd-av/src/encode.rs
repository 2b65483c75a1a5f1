//! Per-job encode supervision.
//!
//! [`start`] launches one ffmpeg process for a job and returns an
//! [`EncodeHandle`] immediately; a monitor task owns the child from then on.
//! The monitor streams stderr through an [`EncodeProgress`] parser, forwards
//! percentage events, and on exit either finalizes the output atomically or
//! cleans up the staging file. All outcomes are reported as messages on the
//! caller's event channel so the scheduler stays the single writer of job
//! state.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tcd_core::{Codec, HwAccel, JobId};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::progress::EncodeProgress;
use crate::settings::{temp_output_path, EncoderSettings};

/// Stderr lines included in failure messages.
const ERROR_TAIL_LINES: usize = 10;

/// Everything needed to launch one encode.
#[derive(Debug, Clone)]
pub struct EncodeSpec {
    pub job_id: JobId,
    /// Launch generation token; echoed back in every event so the scheduler
    /// can detect events from a session it no longer tracks.
    pub generation: u64,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub codec: Codec,
    pub hw: Option<HwAccel>,
    pub quality: u32,
    /// Optional downscale target width; height is auto-computed even.
    pub scale_width: Option<u32>,
}

/// Terminal result of an encode session.
#[derive(Debug, Clone)]
pub enum EncodeOutcome {
    Completed {
        /// Size of the finalized output file in bytes.
        output_size: i64,
    },
    Failed {
        /// Error description including trailing stderr context.
        message: String,
    },
}

/// Message emitted by a monitor task.
#[derive(Debug)]
pub enum EncodeEvent {
    Progress {
        job_id: JobId,
        generation: u64,
        percent: f64,
    },
    Finished {
        job_id: JobId,
        generation: u64,
        outcome: EncodeOutcome,
    },
}

#[derive(Debug, Clone, Copy)]
enum CancelKind {
    Graceful,
    Force,
}

/// Control handle for a running encode session.
#[derive(Debug)]
pub struct EncodeHandle {
    job_id: JobId,
    generation: u64,
    cancel_tx: mpsc::Sender<CancelKind>,
    cancelled: Arc<AtomicBool>,
}

impl EncodeHandle {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Request cancellation of the session.
    ///
    /// `forceful = false` delivers a graceful terminate signal; `true` kills
    /// the process immediately. Idempotent: a second call (or a call after
    /// the session already finished) returns false.
    pub fn cancel(&self, forceful: bool) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        let kind = if forceful {
            CancelKind::Force
        } else {
            CancelKind::Graceful
        };
        self.cancel_tx.try_send(kind).is_ok()
    }
}

/// Build the ffmpeg argument vector for a spec.
///
/// Shape: input, map all streams, optional scale filter, video codec and
/// options, audio and subtitle streams copied verbatim, overwrite, temp
/// output.
pub fn build_args(spec: &EncodeSpec) -> Vec<String> {
    let settings = EncoderSettings::resolve(spec.codec, spec.hw, spec.quality);
    let temp = temp_output_path(&spec.output_path);

    let mut args: Vec<String> = vec![
        "-i".into(),
        spec.input_path.to_string_lossy().into_owned(),
        "-map".into(),
        "0".into(),
    ];

    if let Some(width) = spec.scale_width {
        if width > 0 {
            args.push("-vf".into());
            args.push(format!("scale={width}:-2"));
        }
    }

    args.push("-c:v".into());
    args.push(settings.video_codec.into());
    args.extend(settings.options);

    args.extend([
        "-c:a".into(),
        "copy".into(),
        "-c:s".into(),
        "copy".into(),
        "-y".into(),
        temp.to_string_lossy().into_owned(),
    ]);

    args
}

/// Launch the encoder process for `spec` and return a control handle.
///
/// Never blocks: the process lifecycle runs on a spawned monitor task which
/// reports through `events`. A spawn failure cleans up any stale staging
/// file and returns the error directly.
pub fn start(
    ffmpeg: &Path,
    spec: EncodeSpec,
    events: mpsc::UnboundedSender<EncodeEvent>,
) -> tcd_core::Result<EncodeHandle> {
    let args = build_args(&spec);
    let temp = temp_output_path(&spec.output_path);

    tracing::debug!(job_id = %spec.job_id, ?args, "Starting ffmpeg");

    let mut cmd = Command::new(ffmpeg);
    cmd.args(&args);
    cmd.stdin(std::process::Stdio::null());
    cmd.stdout(std::process::Stdio::null());
    cmd.stderr(std::process::Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            let _ = std::fs::remove_file(&temp);
            return Err(tcd_core::Error::Tool {
                tool: "ffmpeg".into(),
                message: format!("failed to spawn: {e}"),
            });
        }
    };

    let (cancel_tx, cancel_rx) = mpsc::channel(2);
    let cancelled = Arc::new(AtomicBool::new(false));

    let handle = EncodeHandle {
        job_id: spec.job_id,
        generation: spec.generation,
        cancel_tx,
        cancelled,
    };

    let stderr = child.stderr.take();
    tokio::spawn(monitor(spec, child, stderr, temp, cancel_rx, events));

    Ok(handle)
}

/// Own the child process until it exits, then finalize or clean up.
async fn monitor(
    spec: EncodeSpec,
    mut child: Child,
    stderr: Option<tokio::process::ChildStderr>,
    temp: PathBuf,
    mut cancel_rx: mpsc::Receiver<CancelKind>,
    events: mpsc::UnboundedSender<EncodeEvent>,
) {
    let mut progress = EncodeProgress::new();
    let mut last_sent: Option<f64> = None;

    if let Some(mut stderr) = stderr {
        let mut buf = [0u8; 8192];
        loop {
            tokio::select! {
                read = stderr.read(&mut buf) => {
                    match read {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let chunk = String::from_utf8_lossy(&buf[..n]);
                            if let Some(pct) = progress.push_chunk(&chunk) {
                                if last_sent != Some(pct) {
                                    last_sent = Some(pct);
                                    let _ = events.send(EncodeEvent::Progress {
                                        job_id: spec.job_id,
                                        generation: spec.generation,
                                        percent: pct,
                                    });
                                }
                            }
                        }
                    }
                }
                Some(kind) = cancel_rx.recv() => {
                    deliver_cancel(&mut child, kind);
                    // Keep draining stderr until the process lets go of it.
                }
            }
        }
    }
    progress.finish();

    let outcome = match child.wait().await {
        Ok(status) if status.success() => finalize(&temp, &spec.output_path).await,
        Ok(status) => {
            remove_temp(&temp).await;
            failed_with_tail(format!("ffmpeg exited with {status}"), &progress)
        }
        Err(e) => {
            remove_temp(&temp).await;
            failed_with_tail(format!("failed to wait for ffmpeg: {e}"), &progress)
        }
    };

    let _ = events.send(EncodeEvent::Finished {
        job_id: spec.job_id,
        generation: spec.generation,
        outcome,
    });
}

/// Atomically move the staging file into place and stat the result.
async fn finalize(temp: &Path, output: &Path) -> EncodeOutcome {
    let result: std::io::Result<i64> = async {
        tokio::fs::rename(temp, output).await?;
        let meta = tokio::fs::metadata(output).await?;
        Ok(meta.len() as i64)
    }
    .await;

    match result {
        Ok(output_size) => EncodeOutcome::Completed { output_size },
        Err(e) => {
            remove_temp(temp).await;
            EncodeOutcome::Failed {
                message: format!("failed to finalize output: {e}"),
            }
        }
    }
}

async fn remove_temp(temp: &Path) {
    if let Err(e) = tokio::fs::remove_file(temp).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove temp file {}: {e}", temp.display());
        }
    }
}

fn deliver_cancel(child: &mut Child, kind: CancelKind) {
    match kind {
        CancelKind::Graceful => terminate(child),
        CancelKind::Force => {
            let _ = child.start_kill();
        }
    }
}

/// Ask the encoder to stop via SIGTERM so it can run its own exit handling.
#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match child.id() {
        Some(pid) => {
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                tracing::warn!("SIGTERM delivery failed (pid {pid}): {e}");
            }
        }
        None => {
            // Already reaped.
        }
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}

/// Build a failure outcome carrying the trailing stderr lines.
fn failed_with_tail(message: String, progress: &EncodeProgress) -> EncodeOutcome {
    let tail = progress.last_lines(ERROR_TAIL_LINES);
    let message = if tail.is_empty() {
        message
    } else {
        format!("{message}\n{tail}")
    };
    EncodeOutcome::Failed { message }
}
