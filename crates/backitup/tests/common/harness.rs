//! Test harness for isolated job and queue execution.

#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use tempfile::TempDir;

use backitup::broadcast::BackupEventBroadcaster;
use backitup::disk::DiskSpaceOracle;
use backitup::job::{JobEvent, JobEventKind, JobOutcome, JobSupervisor, SupervisorConfig};
use backitup::queue::{QueueController, QueueTiming};
use backitup::schema::{Schema, SchemaStore};

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Reports a fixed amount of free space for any existing path.
#[derive(Debug, Clone, Copy)]
pub struct FakeDisk {
    pub free: u64,
    /// Report every path as missing.
    pub missing: bool,
}

impl FakeDisk {
    pub fn plenty() -> Self {
        Self {
            free: u64::MAX,
            missing: false,
        }
    }

    pub fn with_free(free: u64) -> Self {
        Self {
            free,
            missing: false,
        }
    }

    pub fn missing() -> Self {
        Self {
            free: 0,
            missing: true,
        }
    }
}

impl DiskSpaceOracle for FakeDisk {
    fn available_bytes(&self, path: &Path) -> io::Result<u64> {
        if self.missing || !path.exists() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such directory"));
        }
        Ok(self.free)
    }
}

/// Fails every query with a non-NotFound error.
#[derive(Debug, Clone, Copy)]
pub struct FailingDisk;

impl DiskSpaceOracle for FailingDisk {
    fn available_bytes(&self, _path: &Path) -> io::Result<u64> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "statvfs denied"))
    }
}

/// Isolated environment: a schema directory, two source directories, a
/// destination directory and a directory for fake rsync scripts.
pub struct TestHarness {
    temp_dir: TempDir,
    pub config_dir: PathBuf,
    pub source_a: PathBuf,
    pub source_b: PathBuf,
    pub dest_dir: PathBuf,
    pub bin_dir: PathBuf,
    scripts: AtomicUsize,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let config_dir = base.join("config");
        let source_a = base.join("source_a");
        let source_b = base.join("source_b");
        let dest_dir = base.join("dest");
        let bin_dir = base.join("bin");

        for dir in [&config_dir, &source_a, &source_b, &dest_dir, &bin_dir] {
            std::fs::create_dir_all(dir).expect("Failed to create harness dir");
        }
        std::fs::write(source_a.join("notes.txt"), "hello").expect("Failed to write source file");

        Self {
            temp_dir,
            config_dir,
            source_a,
            source_b,
            dest_dir,
            bin_dir,
            scripts: AtomicUsize::new(0),
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path_str(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    pub fn dest(&self) -> String {
        Self::path_str(&self.dest_dir)
    }

    /// A schema over `source_a` into `dest_dir`.
    pub fn schema(&self, name: &str) -> Schema {
        Schema::new(name, [Self::path_str(&self.source_a)], self.dest())
    }

    pub fn store(&self) -> SchemaStore {
        SchemaStore::open(&self.config_dir).expect("Failed to open schema store")
    }

    pub fn save_schema(&self, schema: &Schema) {
        self.store().save(schema).expect("Failed to save schema");
    }

    /// Writes an executable `/bin/sh` script standing in for rsync.
    #[cfg(unix)]
    pub fn fake_rsync(&self, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let n = self.scripts.fetch_add(1, Ordering::SeqCst);
        let path = self.bin_dir.join(format!("rsync-{}", n));
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to chmod script");
        path
    }

    /// A path inside the temp dir that the scripts can write markers to.
    pub fn marker(&self, name: &str) -> PathBuf {
        self.temp_path().join(name)
    }

    pub fn config(&self, rsync: &Path) -> SupervisorConfig {
        SupervisorConfig {
            rsync_binary: Self::path_str(rsync),
            ..SupervisorConfig::default()
        }
    }

    pub fn supervisor(
        &self,
        config: SupervisorConfig,
        disk: impl DiskSpaceOracle + 'static,
    ) -> JobSupervisor {
        JobSupervisor::with_disk_oracle(config, Arc::new(disk))
    }

    pub fn fast_timing() -> QueueTiming {
        QueueTiming {
            tick_interval: Duration::from_millis(20),
            retry_delay: Duration::from_millis(5),
            after_job_delay: Duration::from_millis(5),
        }
    }

    pub fn controller(&self, config: SupervisorConfig) -> QueueController {
        QueueController::new(
            self.store(),
            self.supervisor(config, FakeDisk::plenty()),
            Self::fast_timing(),
            BackupEventBroadcaster::new(4096),
        )
    }
}

/// Receives events until the terminal one. Panics on timeout.
pub fn collect_until_terminal(rx: &Receiver<JobEvent>) -> Vec<JobEvent> {
    let deadline = Instant::now() + EVENT_TIMEOUT;
    let mut events = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = rx
            .recv_timeout(remaining)
            .expect("Timed out waiting for job events");
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            return events;
        }
    }
}

/// Asserts exactly one terminal event, in last position, and returns its
/// success flag and status.
pub fn terminal(events: &[JobEvent]) -> (JobOutcome, bool, String) {
    let count = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(count, 1, "expected exactly one terminal event: {:#?}", events);
    match &events.last().expect("no events").kind {
        JobEventKind::Finished {
            outcome,
            success,
            status,
        } => (*outcome, *success, status.clone()),
        other => panic!("last event is not terminal: {:?}", other),
    }
}

pub fn log_lines(events: &[JobEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match &e.kind {
            JobEventKind::Log { line } => Some(line.clone()),
            _ => None,
        })
        .collect()
}

pub fn progress_values(events: &[JobEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e.kind {
            JobEventKind::Progress { percentage } => Some(percentage),
            _ => None,
        })
        .collect()
}

/// Polls `check` until it holds. Panics on timeout.
pub fn wait_for(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + EVENT_TIMEOUT;
    while !check() {
        assert!(Instant::now() < deadline, "Timed out waiting for {}", what);
        std::thread::sleep(Duration::from_millis(10));
    }
}
