//! Execution of a single backup job.
//!
//! A job runs one schema through one rsync subprocess on a dedicated worker
//! thread. Everything the worker has to say (log lines, progress, errors and
//! the final outcome) travels over a channel as [`JobEvent`]s; the last event
//! of every job is exactly one [`JobEventKind::Finished`].

pub mod command;
pub mod emitter;
pub mod events;
pub mod progress;
mod runner;
pub mod supervisor;

pub use command::RsyncCommand;
pub use emitter::JobEmitter;
pub use events::{JobEvent, JobEventKind, JobOutcome, JobPhase};
pub use progress::{parse_progress_percent, ProgressTracker};
pub use supervisor::{CancelToken, JobHandle, JobSupervisor, SupervisorConfig};
