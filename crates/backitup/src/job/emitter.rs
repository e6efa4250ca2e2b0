//! One-way event sender owned by a job's worker.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::{debug, error};

use super::events::{JobEvent, JobEventKind, JobOutcome, JobPhase};

/// Shared view of a job's current phase.
#[derive(Debug, Clone, Default)]
pub(crate) struct PhaseCell(Arc<AtomicU8>);

impl PhaseCell {
    pub(crate) fn get(&self) -> JobPhase {
        JobPhase::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, phase: JobPhase) {
        self.0.store(phase as u8, Ordering::Release);
    }
}

/// Sends a job's events to the controller.
///
/// [`JobEmitter::finish`] consumes the emitter, so nothing can be sent after
/// the terminal event. If the emitter is dropped without finishing (the
/// worker unwound from a panic), a `failed` terminal event is sent instead.
pub struct JobEmitter {
    job_id: String,
    schema_name: String,
    sender: Sender<JobEvent>,
    phase: PhaseCell,
    finished: bool,
}

impl JobEmitter {
    pub(crate) fn new(
        job_id: &str,
        schema_name: &str,
        sender: Sender<JobEvent>,
        phase: PhaseCell,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            schema_name: schema_name.to_string(),
            sender,
            phase,
            finished: false,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub(crate) fn enter(&self, phase: JobPhase) {
        debug!(job_id = %self.job_id, "phase -> {}", phase);
        self.phase.set(phase);
    }

    pub fn progress(&self, percentage: u8) {
        self.send(JobEventKind::Progress { percentage });
    }

    pub fn log(&self, line: impl Into<String>) {
        self.send(JobEventKind::Log { line: line.into() });
    }

    pub fn disk_space_error(&self, message: impl Into<String>) {
        self.send(JobEventKind::DiskSpaceError {
            message: message.into(),
        });
    }

    pub fn validation_error(&self, message: impl Into<String>) {
        self.send(JobEventKind::ValidationError {
            message: message.into(),
        });
    }

    /// Sends the terminal event.
    pub fn finish(mut self, outcome: JobOutcome, status: impl Into<String>) {
        self.send_finished(outcome, status.into());
    }

    fn send_finished(&mut self, outcome: JobOutcome, status: String) {
        self.finished = true;
        self.phase.set(outcome.into());
        self.send(JobEventKind::Finished {
            outcome,
            success: outcome.is_success(),
            status,
        });
    }

    fn send(&self, kind: JobEventKind) {
        let event = JobEvent::new(&self.job_id, &self.schema_name, kind);
        // A closed channel means the controller is gone; the job still runs
        // to completion so the subprocess is reaped.
        if self.sender.send(event).is_err() {
            debug!(job_id = %self.job_id, "event receiver dropped");
        }
    }
}

impl Drop for JobEmitter {
    fn drop(&mut self) {
        if !self.finished {
            error!(
                job_id = %self.job_id,
                schema = %self.schema_name,
                "job ended without reporting an outcome"
            );
            self.send_finished(
                JobOutcome::Failed,
                "An unexpected error occurred during backup: worker stopped unexpectedly"
                    .to_string(),
            );
        }
    }
}

impl std::fmt::Debug for JobEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobEmitter")
            .field("job_id", &self.job_id)
            .field("schema_name", &self.schema_name)
            .field("finished", &self.finished)
            .finish()
    }
}
