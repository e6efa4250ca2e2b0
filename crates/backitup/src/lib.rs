pub mod broadcast;
pub mod config;
pub mod disk;
pub mod error;
pub mod job;
pub mod logging;
pub mod queue;
pub mod sanitize;
pub mod schema;
pub mod validation;

pub use broadcast::BackupEventBroadcaster;
pub use config::{load_settings, load_settings_or_default, Settings};
pub use disk::{DiskSpaceOracle, FsDiskSpace};
pub use error::{BackitupError, ConfigError, JobError, QueueError, Result, SchemaError};
pub use job::{JobEvent, JobEventKind, JobHandle, JobOutcome, JobPhase, JobSupervisor};
pub use queue::{EnqueueOutcome, QueueController, QueueHandle, QueueStatus};
pub use schema::{LoadedSchema, Schema, SchemaStore};
pub use validation::{validate_paths, PathValidation};
