//! Starts jobs on their own worker thread and hands back a control handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use tokio::sync::Notify;
use uuid::Uuid;

use super::emitter::{JobEmitter, PhaseCell};
use super::events::{JobEvent, JobPhase};
use super::runner::JobRunner;
use crate::config::Settings;
use crate::disk::{DiskSpaceOracle, FsDiskSpace};
use crate::error::JobError;
use crate::schema::Schema;

/// Per-job settings taken from [`Settings`].
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    pub rsync_binary: String,
    pub rsync_extra_args: Vec<String>,
    pub min_free_bytes: u64,
    pub vanished_exit_code: i32,
    /// Force-kill a cancelled process that is still alive after this long.
    /// `None` waits for it indefinitely.
    pub terminate_grace: Option<Duration>,
}

impl From<&Settings> for SupervisorConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            rsync_binary: settings.rsync_binary.clone(),
            rsync_extra_args: settings.rsync_extra_args.clone(),
            min_free_bytes: settings.min_free_bytes,
            vanished_exit_code: settings.vanished_exit_code,
            terminate_grace: settings.terminate_grace(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
    pid: Mutex<Option<u32>>,
}

/// Cooperative cancellation flag shared between a [`JobHandle`] and its
/// worker.
///
/// The worker checks the flag before every output line. Setting it also
/// sends SIGTERM straight to the attached process so a worker blocked on a
/// quiet process wakes up.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Sets the flag. Returns `false` if it was already set.
    pub fn cancel(&self) -> bool {
        if self.state.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.state.notify.notify_one();
        if let Some(pid) = *self.pid_slot() {
            terminate_pid(pid);
        }
        true
    }

    /// Resolves once [`CancelToken::cancel`] has been called.
    pub(crate) async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.state.notify.notified().await;
    }

    /// Registers the live process. Must be detached before the process is
    /// reaped so the pid is never signalled after reuse.
    pub(crate) fn attach(&self, pid: u32) {
        *self.pid_slot() = Some(pid);
    }

    pub(crate) fn detach(&self) {
        *self.pid_slot() = None;
    }

    fn pid_slot(&self) -> std::sync::MutexGuard<'_, Option<u32>> {
        self.state.pid.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sends a graceful termination request.
#[cfg(unix)]
pub(crate) fn terminate_pid(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => log::warn!("Sent SIGTERM to sync process {}", pid),
        Err(nix::errno::Errno::ESRCH) => log::debug!("Sync process {} already exited", pid),
        Err(e) => log::error!("Failed to terminate sync process {}: {}", pid, e),
    }
}

/// Without POSIX signals the worker force-kills the process itself.
#[cfg(not(unix))]
pub(crate) fn terminate_pid(pid: u32) {
    log::debug!("Termination of {} deferred to the worker", pid);
}

/// Launches jobs. Holds no per-job state.
pub struct JobSupervisor {
    config: Arc<SupervisorConfig>,
    disk: Arc<dyn DiskSpaceOracle>,
}

impl JobSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_disk_oracle(config, Arc::new(FsDiskSpace))
    }

    pub fn with_disk_oracle(config: SupervisorConfig, disk: Arc<dyn DiskSpaceOracle>) -> Self {
        Self {
            config: Arc::new(config),
            disk,
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Starts a job for `schema` on a new worker thread.
    ///
    /// Every event of the job, ending with exactly one terminal event, is
    /// sent to `events`. An `Err` means the worker thread could not be
    /// created.
    pub fn start(&self, schema: Schema, events: Sender<JobEvent>) -> Result<JobHandle, JobError> {
        let id = Uuid::new_v4().to_string();
        let phase = PhaseCell::default();
        let cancel = CancelToken::default();
        let schema_name = schema.name.clone();

        let emitter = JobEmitter::new(&id, &schema_name, events, phase.clone());
        let runner = JobRunner::new(
            schema,
            Arc::clone(&self.config),
            Arc::clone(&self.disk),
            cancel.clone(),
        );

        let thread = thread::Builder::new()
            .name(format!("backup-{}", &id[..8]))
            .spawn(move || runner.run(emitter))?;

        log::info!("Started backup job {} for '{}'", id, schema_name);

        Ok(JobHandle {
            id,
            schema_name,
            phase,
            cancel,
            thread: Some(thread),
        })
    }
}

/// Control side of one running job.
#[derive(Debug)]
pub struct JobHandle {
    id: String,
    schema_name: String,
    phase: PhaseCell,
    cancel: CancelToken,
    thread: Option<JoinHandle<()>>,
}

impl JobHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn phase(&self) -> JobPhase {
        self.phase.get()
    }

    /// Requests cancellation. Idempotent, and a no-op once the job has
    /// reached a terminal phase. Returns whether this call set the flag.
    pub fn cancel(&self) -> bool {
        if self.phase().is_terminal() {
            return false;
        }
        let newly = self.cancel.cancel();
        if newly {
            log::info!("Cancel requested for '{}' ({})", self.schema_name, self.id);
        }
        newly
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the worker thread has exited. A job can be terminal while its
    /// worker is still reaping a cancelled process.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Waits for the worker thread to exit.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Worker for '{}' ({}) panicked", self.schema_name, self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_settings() {
        let settings = Settings {
            rsync_binary: "/opt/rsync".to_string(),
            terminate_grace_ms: Some(250),
            ..Settings::default()
        };
        let config = SupervisorConfig::from(&settings);
        assert_eq!(config.rsync_binary, "/opt/rsync");
        assert_eq!(config.terminate_grace, Some(Duration::from_millis(250)));
        assert_eq!(config.vanished_exit_code, 24);
        assert_eq!(config.min_free_bytes, 100 * 1024 * 1024);
    }

    #[test]
    fn test_cancel_token_is_idempotent() {
        let token = CancelToken::default();
        assert!(!token.is_cancelled());
        assert!(token.cancel());
        assert!(!token.cancel());
        assert!(token.is_cancelled());
        assert!(token.clone().is_cancelled());
    }

    #[test]
    fn test_detach_clears_pid() {
        let token = CancelToken::default();
        token.attach(12345);
        token.detach();
        assert_eq!(*token.pid_slot(), None);
        // No pid attached, so this only flips the flag.
        assert!(token.cancel());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_cancel() {
        let token = CancelToken::default();
        let waiter = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            token.cancel();
        });
        tokio::time::timeout(Duration::from_secs(5), waiter.cancelled())
            .await
            .expect("cancellation was not observed");
    }

    #[tokio::test]
    async fn test_cancelled_resolves_when_already_set() {
        let token = CancelToken::default();
        token.cancel();
        token.cancelled().await;
    }
}
