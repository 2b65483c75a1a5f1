//! The job scheduler control loop.
//!
//! A single tokio task owns the running-job registry, the poll interval and
//! both inbound channels (supervisor events and control commands), so job
//! records have exactly one writer. Concurrency is bounded at tick
//! boundaries: each tick fills free slots from the oldest queued jobs and
//! nothing else ever starts a job.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use tcd_av::capability::CapabilityCache;
use tcd_av::encode::{self, EncodeEvent, EncodeHandle, EncodeOutcome, EncodeSpec};
use tcd_av::tools::ToolRegistry;
use tcd_core::config::Config;
use tcd_core::{JobId, JobStatus};
use tcd_db::pool::{get_conn, DbPool};
use tcd_db::queries::jobs;

/// Control messages serviced by the scheduler task.
enum QueueCommand {
    /// Graceful stop: affects only queued or running jobs.
    Stop {
        id: JobId,
        reply: oneshot::Sender<bool>,
    },
    /// Unconditional kill-and-delete, bypassing the state machine.
    ForceStopAndRemove {
        id: JobId,
        reply: oneshot::Sender<bool>,
    },
}

/// Cloneable handle for submitting control commands to the scheduler.
#[derive(Clone)]
pub struct QueueHandle {
    cmd_tx: mpsc::Sender<QueueCommand>,
}

impl QueueHandle {
    /// Gracefully stop a queued or running job.
    ///
    /// Returns true if the job was cancelled; false if it was already
    /// terminal, unknown, or the scheduler is shutting down.
    pub async fn stop(&self, id: JobId) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(QueueCommand::Stop { id, reply })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Kill the job's process if one is tracked and delete the record
    /// unconditionally.
    pub async fn force_stop_and_remove(&self, id: JobId) -> bool {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(QueueCommand::ForceStopAndRemove { id, reply })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }
}

/// Spawn the scheduler task and return its control handle.
///
/// The loop runs until `cancel` fires; in-flight encoder processes are
/// abandoned (and killed when their monitor tasks drop).
pub fn spawn_scheduler(
    pool: DbPool,
    config: Arc<Config>,
    tools: Arc<ToolRegistry>,
    capabilities: Arc<CapabilityCache>,
    cancel: CancellationToken,
) -> QueueHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let scheduler = Scheduler {
        pool,
        config,
        tools,
        capabilities,
        registry: HashMap::new(),
        events_tx,
        next_generation: 0,
    };

    tokio::spawn(scheduler.run(cmd_rx, events_rx, cancel));

    QueueHandle { cmd_tx }
}

struct Scheduler {
    pool: DbPool,
    config: Arc<Config>,
    tools: Arc<ToolRegistry>,
    capabilities: Arc<CapabilityCache>,
    /// Live encode sessions, keyed by job id. Owned exclusively by the
    /// scheduler task.
    registry: HashMap<JobId, EncodeHandle>,
    events_tx: mpsc::UnboundedSender<EncodeEvent>,
    next_generation: u64,
}

impl Scheduler {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<QueueCommand>,
        mut events_rx: mpsc::UnboundedReceiver<EncodeEvent>,
        cancel: CancellationToken,
    ) {
        tracing::info!(
            max_concurrent = self.config.queue.max_concurrent_jobs,
            tick_secs = self.config.queue.tick_secs,
            "Job scheduler started"
        );

        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.queue.tick_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                // First tick fires immediately, giving the startup run.
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!("Scheduler tick failed: {e}");
                    }
                }
                Some(event) = events_rx.recv() => self.handle_event(event),
                Some(cmd) = cmd_rx.recv() => self.handle_command(cmd),
            }
        }

        if !self.registry.is_empty() {
            tracing::info!(
                in_flight = self.registry.len(),
                "Scheduler stopping with encodes in flight"
            );
        }
        tracing::info!("Job scheduler stopped");
    }

    /// Fill free slots from the queue, oldest first.
    async fn tick(&mut self) -> tcd_core::Result<()> {
        let mut running = {
            let conn = get_conn(&self.pool)?;
            jobs::count_running(&conn)? as usize
        };

        while running < self.config.queue.max_concurrent_jobs {
            let Some(job) = ({
                let conn = get_conn(&self.pool)?;
                jobs::next_queued_job(&conn)?
            }) else {
                break;
            };

            // Resolve hardware before re-opening a connection, so the
            // !Send SQLite connection is never held across the capability
            // probe await (which would make this future non-Send).
            let hw = if job.requested_hw {
                self.capabilities.get(&self.tools).await.preferred_for(job.codec)
            } else {
                None
            };

            let conn = get_conn(&self.pool)?;
            self.start_job(&conn, job, hw);
            running += 1;
        }

        Ok(())
    }

    /// Move one queued job to running and hand it to the supervisor.
    ///
    /// Per-job failures mark that job failed; they never abort the tick.
    fn start_job(
        &mut self,
        conn: &rusqlite::Connection,
        job: tcd_db::models::Job,
        hw: Option<tcd_core::HwAccel>,
    ) {
        let id = job.id;
        tracing::info!(job_id = %id, filename = %job.filename, "Starting job");

        // Requested-but-unavailable hardware corrects the persisted flag and
        // falls back to software rather than failing the job.
        if job.requested_hw && hw.is_none() {
            tracing::info!(
                job_id = %id,
                codec = %job.codec,
                "Hardware encoding requested but unavailable, falling back to software"
            );
            if let Err(e) = jobs::clear_requested_hw(conn, id) {
                tracing::warn!(job_id = %id, "Failed to persist hardware fallback: {e}");
            }
        }

        match jobs::mark_running(conn, id, hw) {
            Ok(true) => {}
            Ok(false) => {
                // Cancelled between the queue read and now; leave it be.
                tracing::debug!(job_id = %id, "Job no longer queued, skipping");
                return;
            }
            Err(e) => {
                tracing::error!(job_id = %id, "Failed to mark job running: {e}");
                return;
            }
        }

        let ffmpeg = match self.tools.require("ffmpeg") {
            Ok(path) => path.clone(),
            Err(e) => {
                tracing::error!(job_id = %id, "{e}");
                let _ = jobs::fail_job(conn, id, &e.to_string());
                return;
            }
        };

        self.next_generation += 1;
        let spec = EncodeSpec {
            job_id: id,
            generation: self.next_generation,
            input_path: job.input_path.into(),
            output_path: job.output_path.into(),
            codec: job.codec,
            hw,
            quality: job.quality,
            scale_width: self.config.encode.scale_width,
        };

        match encode::start(&ffmpeg, spec, self.events_tx.clone()) {
            Ok(handle) => {
                self.registry.insert(id, handle);
            }
            Err(e) => {
                tracing::error!(job_id = %id, "Failed to start encoder: {e}");
                let _ = jobs::fail_job(conn, id, &e.to_string());
            }
        }
    }

    fn handle_event(&mut self, event: EncodeEvent) {
        match event {
            EncodeEvent::Progress {
                job_id,
                generation,
                percent,
            } => {
                if !self.tracks(job_id, generation) {
                    tracing::debug!(job_id = %job_id, "Dropping progress from stale session");
                    return;
                }
                // Best effort: a failed write is a transient liveness gap,
                // not a job failure.
                match get_conn(&self.pool)
                    .and_then(|conn| jobs::update_progress(&conn, job_id, percent))
                {
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(job_id = %job_id, "Failed to persist progress: {e}")
                    }
                }
            }
            EncodeEvent::Finished {
                job_id,
                generation,
                outcome,
            } => {
                if !self.tracks(job_id, generation) {
                    // The job was force-removed or cancelled while the
                    // process wound down; nothing left to record.
                    tracing::debug!(job_id = %job_id, "Dropping completion from stale session");
                    return;
                }
                self.registry.remove(&job_id);
                self.finish_job(job_id, outcome);
            }
        }
    }

    /// Whether the registry holds this exact session generation.
    fn tracks(&self, id: JobId, generation: u64) -> bool {
        self.registry
            .get(&id)
            .map(|h| h.generation() == generation)
            .unwrap_or(false)
    }

    fn finish_job(&mut self, id: JobId, outcome: EncodeOutcome) {
        let conn = match get_conn(&self.pool) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(job_id = %id, "Cannot record job outcome: {e}");
                return;
            }
        };

        match outcome {
            EncodeOutcome::Completed { output_size } => {
                tracing::info!(job_id = %id, output_size, "Job completed");
                match jobs::complete_job(&conn, id, output_size) {
                    Ok(true) => self.maybe_delete_source(&conn, id, output_size),
                    Ok(false) => {
                        tracing::debug!(job_id = %id, "Job left running state before completion")
                    }
                    Err(e) => tracing::error!(job_id = %id, "Failed to persist completion: {e}"),
                }
            }
            EncodeOutcome::Failed { message } => {
                tracing::warn!(job_id = %id, "Job failed: {message}");
                match jobs::fail_job(&conn, id, &message) {
                    Ok(_) => {}
                    Err(e) => tracing::error!(job_id = %id, "Failed to persist failure: {e}"),
                }
            }
        }
    }

    /// Delete the source file of a completed job once the output is
    /// validated. Failures here are logged and never change job status.
    fn maybe_delete_source(&self, conn: &rusqlite::Connection, id: JobId, reported_size: i64) {
        let job = match jobs::get_job(conn, id) {
            Ok(Some(job)) => job,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(job_id = %id, "Auto-delete skipped, re-read failed: {e}");
                return;
            }
        };

        if !job.auto_delete_source || job.status != JobStatus::Completed {
            return;
        }

        let meta = match std::fs::metadata(&job.output_path) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(job_id = %id, "Auto-delete skipped, cannot stat output: {e}");
                return;
            }
        };

        if meta.len() == 0 {
            tracing::warn!(job_id = %id, "Auto-delete skipped, output is empty");
            return;
        }
        if meta.len() as i64 != reported_size {
            tracing::warn!(
                job_id = %id,
                expected = reported_size,
                actual = meta.len(),
                "Auto-delete skipped, output size mismatch"
            );
            return;
        }

        match std::fs::remove_file(&job.input_path) {
            Ok(()) => tracing::info!(job_id = %id, input = %job.input_path, "Source file deleted"),
            Err(e) => tracing::warn!(job_id = %id, "Failed to delete source file: {e}"),
        }
    }

    fn handle_command(&mut self, cmd: QueueCommand) {
        match cmd {
            QueueCommand::Stop { id, reply } => {
                let _ = reply.send(self.stop_job(id));
            }
            QueueCommand::ForceStopAndRemove { id, reply } => {
                let _ = reply.send(self.force_stop_and_remove(id));
            }
        }
    }

    fn stop_job(&mut self, id: JobId) -> bool {
        if let Some(handle) = self.registry.remove(&id) {
            tracing::info!(job_id = %id, "Stopping running job");
            handle.cancel(false);
            // The session's eventual completion event is stale once the
            // registry entry is gone; record the cancellation now.
            return match get_conn(&self.pool).and_then(|conn| jobs::cancel_job(&conn, id)) {
                Ok(changed) => changed,
                Err(e) => {
                    tracing::error!(job_id = %id, "Failed to persist cancellation: {e}");
                    false
                }
            };
        }

        // Not running here; a queued job cancels directly, without any
        // process ever being spawned.
        match get_conn(&self.pool).and_then(|conn| {
            match jobs::get_job(&conn, id)? {
                Some(job) if job.status == JobStatus::Queued => jobs::cancel_job(&conn, id),
                _ => Ok(false),
            }
        }) {
            Ok(changed) => changed,
            Err(e) => {
                tracing::error!(job_id = %id, "Failed to cancel job: {e}");
                false
            }
        }
    }

    fn force_stop_and_remove(&mut self, id: JobId) -> bool {
        if let Some(handle) = self.registry.remove(&id) {
            tracing::info!(job_id = %id, "Force killing job");
            handle.cancel(true);
        }

        match get_conn(&self.pool).and_then(|conn| jobs::delete_job(&conn, id)) {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(job_id = %id, "Failed to delete job record: {e}");
                false
            }
        }
    }
}
