//! The backup queue controller.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crossbeam_channel::{never, select, unbounded, Receiver, Sender};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::handle::{ControlCommand, EnqueueOutcome, FinishedJob, QueueStatus};
use crate::broadcast::BackupEventBroadcaster;
use crate::config::Settings;
use crate::error::BackitupError;
use crate::job::{JobEvent, JobEventKind, JobHandle, JobOutcome, JobSupervisor, SupervisorConfig};
use crate::schema::SchemaStore;

/// Most recent terminal results kept by [`QueueController::finished`].
pub const FINISHED_HISTORY: usize = 256;

/// Scheduling delays of the controller loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueTiming {
    /// Period of the recurring check for startable work.
    pub tick_interval: Duration,
    /// Delay before the next check after a queued name failed to resolve.
    pub retry_delay: Duration,
    /// Delay before the next check after a job finished.
    pub after_job_delay: Duration,
}

impl From<&Settings> for QueueTiming {
    fn from(settings: &Settings) -> Self {
        Self {
            tick_interval: settings.tick_interval(),
            retry_delay: settings.retry_delay(),
            after_job_delay: settings.after_job_delay(),
        }
    }
}

impl Default for QueueTiming {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

/// Runs queued schemas one at a time.
///
/// At most one job is active. A new job is only started by [`tick`], which
/// never runs while a job is active, and the active slot is only cleared
/// after that job's terminal event has been broadcast. A cancelled job
/// reports its terminal event before its process has exited; its handle
/// then sits in the draining slot and no other job starts until its worker
/// thread is gone.
///
/// [`tick`]: QueueController::tick
pub struct QueueController {
    store: SchemaStore,
    supervisor: JobSupervisor,
    timing: QueueTiming,
    broadcaster: BackupEventBroadcaster,
    pending: VecDeque<String>,
    active: Option<JobHandle>,
    draining: Option<JobHandle>,
    events_tx: Sender<JobEvent>,
    events_rx: Receiver<JobEvent>,
    next_check: Instant,
    finished: Vec<FinishedJob>,
}

impl QueueController {
    pub fn new(
        store: SchemaStore,
        supervisor: JobSupervisor,
        timing: QueueTiming,
        broadcaster: BackupEventBroadcaster,
    ) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            store,
            supervisor,
            timing,
            broadcaster,
            pending: VecDeque::new(),
            active: None,
            draining: None,
            events_tx,
            events_rx,
            next_check: Instant::now() + timing.tick_interval,
            finished: Vec::new(),
        }
    }

    /// Opens the store in `settings.config_dir` and wires the controller
    /// from the settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, BackitupError> {
        let store = SchemaStore::open(&settings.config_dir)?;
        let supervisor = JobSupervisor::new(SupervisorConfig::from(settings));
        Ok(Self::new(
            store,
            supervisor,
            QueueTiming::from(settings),
            BackupEventBroadcaster::new(settings.event_capacity),
        ))
    }

    pub fn store(&self) -> &SchemaStore {
        &self.store
    }

    pub fn broadcaster(&self) -> &BackupEventBroadcaster {
        &self.broadcaster
    }

    /// Queues `name` unless it is already pending.
    ///
    /// The record is loaded and validated now to refuse schemas that are
    /// currently invalid; the job itself uses whatever is on disk when it
    /// is popped.
    pub fn enqueue(&mut self, name: &str) -> EnqueueOutcome {
        if self.pending.iter().any(|queued| queued == name) {
            info!("Schema '{}' is already in the queue", name);
            return EnqueueOutcome::AlreadyQueued;
        }

        let loaded = match self.store.load(name) {
            Ok(Some(loaded)) => loaded,
            Ok(None) => return EnqueueOutcome::NotFound,
            Err(e) => {
                warn!("Refusing to queue '{}': {}", name, e);
                return EnqueueOutcome::Invalid {
                    problems: vec![e.to_string()],
                };
            }
        };

        if !loaded.is_valid() {
            warn!(
                "Refusing to queue invalid schema '{}': {}",
                name,
                loaded.validation.summary()
            );
            return EnqueueOutcome::Invalid {
                problems: loaded.validation.problems,
            };
        }

        self.pending.push_back(name.to_string());
        info!("Added '{}' to backup queue", name);

        if self.active.is_none() {
            self.next_check = Instant::now();
        }
        EnqueueOutcome::Queued {
            position: self.pending.len(),
        }
    }

    /// Requests cancellation of the running job. Returns whether a job was
    /// active.
    pub fn cancel_active_job(&mut self) -> bool {
        match &self.active {
            Some(job) => {
                job.cancel();
                true
            }
            None => {
                debug!("No active job to cancel");
                false
            }
        }
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            pending: self.pending.iter().cloned().collect(),
            active: self
                .active
                .as_ref()
                .map(|job| job.schema_name().to_string()),
        }
    }

    /// No job running or queued, and no finished worker still exiting.
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.draining.is_none() && self.pending.is_empty()
    }

    /// Jobs that reached a terminal event, oldest first. Only the last
    /// [`FINISHED_HISTORY`] are kept.
    pub fn finished(&self) -> &[FinishedJob] {
        &self.finished
    }

    /// Hands over the recorded results and clears them.
    pub fn take_finished(&mut self) -> Vec<FinishedJob> {
        std::mem::take(&mut self.finished)
    }

    /// Joins the previous job's worker once it has exited. Returns whether
    /// the draining slot is empty.
    fn reap_draining(&mut self) -> bool {
        match self.draining.take() {
            Some(job) if job.is_finished() => {
                debug!("Worker for '{}' exited", job.schema_name());
                job.join();
                true
            }
            Some(job) => {
                self.draining = Some(job);
                false
            }
            None => true,
        }
    }

    /// Starts the head of the queue if no job is active and the previous
    /// worker has exited.
    ///
    /// The name is resolved against the store at this point. A name that no
    /// longer resolves is skipped and the queue is re-checked after the
    /// short retry delay instead of a full tick.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.next_check = now + self.timing.tick_interval;

        if self.active.is_some() {
            return;
        }
        if !self.reap_draining() {
            self.next_check = now + self.timing.retry_delay;
            return;
        }
        let Some(name) = self.pending.pop_front() else {
            return;
        };

        let schema = match self.store.load(&name) {
            Ok(Some(loaded)) => loaded.schema,
            Ok(None) => {
                warn!("Schema '{}' no longer exists, skipping", name);
                self.next_check = now + self.timing.retry_delay;
                return;
            }
            Err(e) => {
                error!("Could not load schema '{}', skipping: {}", name, e);
                self.next_check = now + self.timing.retry_delay;
                return;
            }
        };

        info!("Starting backup job for schema: {}", name);
        match self.supervisor.start(schema, self.events_tx.clone()) {
            Ok(job) => self.active = Some(job),
            Err(e) => {
                error!("Failed to start job for '{}': {}", name, e);
                let job_id = Uuid::new_v4().to_string();
                let event = JobEvent::finished(
                    &job_id,
                    &name,
                    JobOutcome::Failed,
                    format!("An unexpected error occurred during backup: {}", e),
                );
                self.record_finished(&event);
                self.broadcaster.send(event);
                self.next_check = now + self.timing.retry_delay;
            }
        }
    }

    /// Delivers every event already waiting on the job channel.
    pub fn pump_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: JobEvent) {
        let is_active = self
            .active
            .as_ref()
            .is_some_and(|job| job.id() == event.job_id);
        if !is_active {
            debug!(job_id = %event.job_id, "Discarding event from detached job");
            return;
        }

        let terminal = event.is_terminal();
        if terminal {
            self.record_finished(&event);
        }
        self.broadcaster.send(event);

        if terminal {
            if let Some(job) = self.active.take() {
                info!("Job for '{}' finished ({})", job.schema_name(), job.phase());
                self.draining = Some(job);
            }
            self.next_check = Instant::now() + self.timing.after_job_delay;
        }
    }

    fn record_finished(&mut self, event: &JobEvent) {
        if let JobEventKind::Finished {
            outcome, status, ..
        } = &event.kind
        {
            if self.finished.len() >= FINISHED_HISTORY {
                self.finished.remove(0);
            }
            self.finished.push(FinishedJob {
                job_id: event.job_id.clone(),
                schema_name: event.schema_name.clone(),
                outcome: *outcome,
                status: status.clone(),
            });
        }
    }

    /// Drives the controller until a [`ControlCommand::Shutdown`] arrives.
    ///
    /// If every [`super::QueueHandle`] is dropped, the controller finishes
    /// the remaining queue and returns once idle.
    pub fn run(&mut self, commands: &Receiver<ControlCommand>) {
        self.run_loop(commands, false);
    }

    /// Processes the queue until it is empty and no job is active.
    pub fn run_until_idle(&mut self) {
        self.run_loop(&never(), true);
    }

    /// Like [`QueueController::run_until_idle`], also serving commands.
    pub fn run_until_idle_with(&mut self, commands: &Receiver<ControlCommand>) {
        self.run_loop(commands, true);
    }

    fn run_loop(&mut self, commands: &Receiver<ControlCommand>, stop_when_idle: bool) {
        let events = self.events_rx.clone();
        let mut commands = commands.clone();
        let mut stop_when_idle = stop_when_idle;

        loop {
            if stop_when_idle && self.is_idle() {
                break;
            }

            let mut shutdown = false;
            let mut disconnected = false;
            let timeout = self.next_check.saturating_duration_since(Instant::now());
            select! {
                recv(commands) -> command => match command {
                    Ok(ControlCommand::Shutdown) => shutdown = true,
                    Ok(command) => self.handle_command(command),
                    Err(_) => disconnected = true,
                },
                recv(events) -> event => {
                    if let Ok(event) = event {
                        self.handle_event(event);
                    }
                },
                default(timeout) => {},
            }

            if shutdown {
                self.shutdown(&events);
                break;
            }
            if disconnected {
                debug!("All queue handles dropped, draining queue");
                commands = never();
                stop_when_idle = true;
                continue;
            }

            if Instant::now() >= self.next_check {
                self.tick();
            }
        }
    }

    fn handle_command(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::Enqueue { name, reply } => {
                let _ = reply.send(self.enqueue(&name));
            }
            ControlCommand::CancelActive { reply } => {
                let _ = reply.send(self.cancel_active_job());
            }
            ControlCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
            ControlCommand::Shutdown => {}
        }
    }

    fn shutdown(&mut self, events: &Receiver<JobEvent>) {
        if !self.pending.is_empty() {
            info!("Dropping {} pending job(s)", self.pending.len());
            self.pending.clear();
        }
        self.cancel_active_job();
        while self.active.is_some() {
            match events.recv() {
                Ok(event) => self.handle_event(event),
                Err(_) => break,
            }
        }
        if let Some(job) = self.draining.take() {
            info!("Waiting for worker of '{}' to exit", job.schema_name());
            job.join();
        }
        info!("Queue controller stopped");
    }
}
