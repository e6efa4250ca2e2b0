//! Worker side of a job: pre-flight checks, then the rsync process.

use std::io;
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr};
use tracing::{error, info, info_span, warn};

use super::command::RsyncCommand;
use super::emitter::JobEmitter;
use super::events::{JobOutcome, JobPhase};
use super::progress::{parse_progress_percent, ProgressTracker};
use super::supervisor::{terminate_pid, CancelToken, SupervisorConfig};
use crate::disk::{format_mib, DiskSpaceOracle};
use crate::error::JobError;
use crate::sanitize::redact_path;
use crate::schema::Schema;

const RSYNC_NOT_FOUND: &str =
    "rsync command not found. Please ensure rsync is installed and in your PATH.";

pub(crate) struct JobRunner {
    schema: Schema,
    config: Arc<SupervisorConfig>,
    disk: Arc<dyn DiskSpaceOracle>,
    cancel: CancelToken,
}

/// How the output loop ended.
enum Supervised {
    Exited(Termination),
    Cancelled,
}

/// Interpretation of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Termination {
    pub outcome: JobOutcome,
    pub status: String,
    /// Extra log line for the vanished-files warning.
    pub warning: Option<String>,
}

impl JobRunner {
    pub(crate) fn new(
        schema: Schema,
        config: Arc<SupervisorConfig>,
        disk: Arc<dyn DiskSpaceOracle>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            schema,
            config,
            disk,
            cancel,
        }
    }

    /// Runs the job to completion on the current thread.
    pub(crate) fn run(self, emitter: JobEmitter) {
        let _span = info_span!(
            "backup_job",
            job_id = %emitter.job_id(),
            schema = %self.schema.name,
        )
        .entered();

        info!("Worker started");
        emitter.log(format!("Starting backup for '{}'...", self.schema.name));

        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                let err = JobError::Runtime(e.to_string());
                error!("{}", err);
                emitter.finish(JobOutcome::Failed, failure_status(&err));
                return;
            }
        };

        runtime.block_on(self.execute(emitter));
        info!("Worker finished");
    }

    async fn execute(&self, emitter: JobEmitter) {
        if let Err(status) = self.preflight(&emitter) {
            emitter.finish(JobOutcome::Failed, status);
            return;
        }

        let command = RsyncCommand::new(
            &self.config.rsync_binary,
            &self.config.rsync_extra_args,
            &self.schema,
        );
        info!("Executing command: {}", command.display());
        emitter.log(format!("Running: {}", command.display()));
        emitter.enter(JobPhase::Running);

        if self.cancel.is_cancelled() {
            emitter.finish(JobOutcome::Cancelled, "Cancelled");
            return;
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                error!("{}", err);
                emitter.finish(JobOutcome::Failed, failure_status(&err));
                return;
            }
        };

        let result = self.supervise(&mut child, &emitter).await;
        self.cancel.detach();

        match result {
            Ok(Supervised::Exited(termination)) => {
                if self.cancel.is_cancelled() {
                    info!("Cancelled before exit status was reported");
                    emitter.finish(JobOutcome::Cancelled, "Cancelled");
                    return;
                }
                if let Some(warning) = &termination.warning {
                    emitter.log(warning.clone());
                }
                match termination.outcome {
                    JobOutcome::Success => info!("Backup completed successfully"),
                    JobOutcome::SuccessWithWarnings => warn!("{}", termination.status),
                    _ => error!("{}", termination.status),
                }
                if termination.outcome.is_success() {
                    emitter.progress(100);
                }
                emitter.finish(termination.outcome, termination.status);
            }
            Ok(Supervised::Cancelled) => {
                info!("Cancellation requested");
                terminate_child(&mut child);
                emitter.finish(JobOutcome::Cancelled, "Cancelled");
                self.reap(child).await;
            }
            Err(err) => {
                error!("Unexpected error: {}", err);
                let _ = child.start_kill();
                emitter.finish(JobOutcome::Failed, failure_status(&err));
                let _ = child.wait().await;
            }
        }
    }

    /// Re-validates paths and checks free space. On failure the error event
    /// has been sent and the terminal status is returned.
    fn preflight(&self, emitter: &JobEmitter) -> Result<(), &'static str> {
        emitter.enter(JobPhase::Validating);
        let validation = self.schema.validate();
        if !validation.is_valid {
            let message = format!(
                "Path validation failed before starting: {}",
                validation.summary()
            );
            error!("{}", message);
            emitter.validation_error(message);
            return Err("Path validation failed");
        }

        emitter.enter(JobPhase::SpaceChecking);
        let destination = &self.schema.destination;
        match self.disk.available_bytes(Path::new(destination)) {
            Ok(free) if free < self.config.min_free_bytes => {
                let message = format!(
                    "Insufficient disk space at destination '{}'. Free: {} MB",
                    destination,
                    format_mib(free)
                );
                error!("{}", message);
                emitter.disk_space_error(message);
                Err("Insufficient disk space")
            }
            Ok(free) => {
                info!(
                    destination = %redact_path(Path::new(destination)),
                    "Free space: {} MB",
                    format_mib(free)
                );
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let message = format!(
                    "Destination directory '{}' not found for disk space check.",
                    destination
                );
                error!("{}", message);
                emitter.validation_error(message);
                Err("Destination not found")
            }
            Err(e) => {
                let message = format!("Error checking disk space for '{}': {}", destination, e);
                error!("{}", message);
                emitter.disk_space_error(message);
                Err("Disk space check error")
            }
        }
    }

    async fn supervise(
        &self,
        child: &mut Child,
        emitter: &JobEmitter,
    ) -> Result<Supervised, JobError> {
        if let Some(pid) = child.id() {
            self.cancel.attach(pid);
        }

        let stderr_task = child.stderr.take().map(|stderr| tokio::spawn(drain(stderr)));
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout of the sync process was not captured"))?;

        let mut lines = OutputLines::new(stdout);
        let mut tracker = ProgressTracker::default();

        loop {
            if self.cancel.is_cancelled() {
                return Ok(Supervised::Cancelled);
            }

            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(Supervised::Cancelled),
                next = lines.next_line() => next?,
            };
            let Some(raw) = next else {
                break;
            };

            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            emitter.log(line);
            if let Some(percentage) = parse_progress_percent(&raw).and_then(|p| tracker.observe(p))
            {
                emitter.progress(percentage);
            }
        }

        let stderr = match stderr_task {
            Some(task) => task.await.map_err(|e| JobError::Runtime(e.to_string()))??,
            None => String::new(),
        };
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            warn!("rsync stderr: {}", stderr);
            emitter.log(format!("STDERR: {}", stderr));
        }

        self.cancel.detach();
        let status = child.wait().await?;
        // A process killed by a signal has no exit code.
        let code = status.code().unwrap_or(-1);
        info!("rsync exited with code {}", code);

        Ok(Supervised::Exited(interpret_exit(
            code,
            stderr,
            self.config.vanished_exit_code,
        )))
    }

    /// Waits for a cancelled process, force-killing it once the grace period
    /// runs out.
    async fn reap(&self, mut child: Child) {
        let Some(grace) = self.config.terminate_grace else {
            let _ = child.wait().await;
            return;
        };
        if tokio::time::timeout(grace, child.wait()).await.is_err() {
            warn!("Sync process still running after {:?}, killing it", grace);
            if let Err(e) = child.kill().await {
                error!("Failed to kill sync process: {}", e);
            }
        }
    }
}

fn terminate_child(child: &mut Child) {
    match child.id() {
        #[cfg(unix)]
        Some(pid) => terminate_pid(pid),
        #[cfg(not(unix))]
        Some(_) => {
            let _ = child.start_kill();
        }
        None => {}
    }
}

/// Maps an exit code and drained stderr to the job's outcome.
pub(crate) fn interpret_exit(code: i32, stderr: &str, vanished_exit_code: i32) -> Termination {
    let stderr = stderr.trim();

    if code == 0 {
        return Termination {
            outcome: JobOutcome::Success,
            status: "Completed".to_string(),
            warning: None,
        };
    }

    if code == vanished_exit_code {
        let mut status = "Completed with warnings: Some files changed during transfer.".to_string();
        let mut warning = None;
        if !stderr.is_empty() {
            status.push_str(&format!(" Details: {}", stderr));
            warning = Some(format!("Warning: {}", stderr));
        }
        return Termination {
            outcome: JobOutcome::SuccessWithWarnings,
            status,
            warning,
        };
    }

    let mut status = format!("rsync failed with return code {}.", code);
    if !stderr.is_empty() {
        status.push_str(&format!(" Stderr: {}", stderr));
    }
    Termination {
        outcome: JobOutcome::Failed,
        status,
        warning: None,
    }
}

fn failure_status(err: &JobError) -> String {
    match err {
        JobError::RsyncNotFound { .. } => RSYNC_NOT_FOUND.to_string(),
        other => format!("An unexpected error occurred during backup: {}", other),
    }
}

async fn drain(mut stderr: ChildStderr) -> io::Result<String> {
    let mut buf = Vec::new();
    stderr.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Splits a byte stream on `\n` and `\r`, decoding each segment lossily.
///
/// Partial segments are kept in `pending`, so a `next_line` future can be
/// dropped at an await point without losing data.
struct OutputLines<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
}

impl<R: AsyncRead + Unpin> OutputLines<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            pending: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_pending()));
            }

            match available.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(end) => {
                    self.pending.extend_from_slice(&available[..end]);
                    self.reader.consume(end + 1);
                    return Ok(Some(self.take_pending()));
                }
                None => {
                    let len = available.len();
                    self.pending.extend_from_slice(available);
                    self.reader.consume(len);
                }
            }
        }
    }

    fn take_pending(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(input: &[u8]) -> Vec<String> {
        let mut lines = OutputLines::new(input);
        let mut out = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            out.push(line);
        }
        out
    }

    #[tokio::test]
    async fn test_split_on_newline_and_carriage_return() {
        let input = concat!(
            "sending incremental file list\r",
            "   1,024  10%  1.00MB/s    0:00:01\r",
            "   2,048  20%  1.00MB/s    0:00:02\n",
            "last"
        );
        let lines = collect(input.as_bytes()).await;
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "sending incremental file list");
        assert_eq!(parse_progress_percent(&lines[2]), Some(20));
        assert_eq!(lines[3], "last");
    }

    #[tokio::test]
    async fn test_crlf_yields_empty_segment() {
        let lines = collect(b"a\r\nb\n").await;
        assert_eq!(lines, vec!["a", "", "b"]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let lines = collect(b"caf\xff\n").await;
        assert_eq!(lines, vec!["caf\u{fffd}"]);
    }

    #[tokio::test]
    async fn test_empty_stream() {
        assert!(collect(b"").await.is_empty());
    }

    #[test]
    fn test_interpret_success() {
        let t = interpret_exit(0, "", 24);
        assert_eq!(t.outcome, JobOutcome::Success);
        assert_eq!(t.status, "Completed");
        assert_eq!(t.warning, None);
    }

    #[test]
    fn test_interpret_vanished_files() {
        let t = interpret_exit(24, "file has vanished: \"/src/tmp.lock\"\n", 24);
        assert_eq!(t.outcome, JobOutcome::SuccessWithWarnings);
        assert!(t.outcome.is_success());
        assert!(t
            .status
            .starts_with("Completed with warnings: Some files changed during transfer."));
        assert!(t.status.contains("file has vanished"));
        assert_eq!(
            t.warning.as_deref(),
            Some("Warning: file has vanished: \"/src/tmp.lock\"")
        );
    }

    #[test]
    fn test_interpret_vanished_without_stderr() {
        let t = interpret_exit(24, "  ", 24);
        assert_eq!(
            t.status,
            "Completed with warnings: Some files changed during transfer."
        );
        assert_eq!(t.warning, None);
    }

    #[test]
    fn test_interpret_failure() {
        let t = interpret_exit(23, "some files could not be transferred", 24);
        assert_eq!(t.outcome, JobOutcome::Failed);
        assert_eq!(
            t.status,
            "rsync failed with return code 23. Stderr: some files could not be transferred"
        );
    }

    #[test]
    fn test_interpret_signal_exit() {
        let t = interpret_exit(-1, "", 24);
        assert_eq!(t.status, "rsync failed with return code -1.");
    }

    #[test]
    fn test_failure_status_not_found() {
        let err = JobError::RsyncNotFound {
            binary: "/opt/bin/rsync".to_string(),
        };
        assert_eq!(failure_status(&err), RSYNC_NOT_FOUND);
        let err = JobError::Runtime("boom".to_string());
        assert!(failure_status(&err).starts_with("An unexpected error occurred during backup:"));
    }
}
