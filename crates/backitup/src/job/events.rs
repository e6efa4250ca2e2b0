//! Events emitted by a running job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Success,
    /// rsync reported that some source files vanished during the transfer.
    SuccessWithWarnings,
    Failed,
    Cancelled,
}

impl JobOutcome {
    /// Whether Presentation should show the job as having succeeded.
    pub fn is_success(self) -> bool {
        matches!(self, JobOutcome::Success | JobOutcome::SuccessWithWarnings)
    }
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobOutcome::Success => write!(f, "success"),
            JobOutcome::SuccessWithWarnings => write!(f, "warning"),
            JobOutcome::Failed => write!(f, "failed"),
            JobOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Lifecycle position of a job.
///
/// `Pending → Validating → SpaceChecking → Running → terminal`, where the
/// four terminal phases mirror [`JobOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum JobPhase {
    Pending = 0,
    Validating = 1,
    SpaceChecking = 2,
    Running = 3,
    Succeeded = 4,
    SucceededWithWarnings = 5,
    Failed = 6,
    Cancelled = 7,
}

impl JobPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobPhase::Succeeded
                | JobPhase::SucceededWithWarnings
                | JobPhase::Failed
                | JobPhase::Cancelled
        )
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => JobPhase::Validating,
            2 => JobPhase::SpaceChecking,
            3 => JobPhase::Running,
            4 => JobPhase::Succeeded,
            5 => JobPhase::SucceededWithWarnings,
            6 => JobPhase::Failed,
            7 => JobPhase::Cancelled,
            _ => JobPhase::Pending,
        }
    }
}

impl From<JobOutcome> for JobPhase {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Success => JobPhase::Succeeded,
            JobOutcome::SuccessWithWarnings => JobPhase::SucceededWithWarnings,
            JobOutcome::Failed => JobPhase::Failed,
            JobOutcome::Cancelled => JobPhase::Cancelled,
        }
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::Pending => write!(f, "Pending"),
            JobPhase::Validating => write!(f, "Validating paths"),
            JobPhase::SpaceChecking => write!(f, "Checking disk space"),
            JobPhase::Running => write!(f, "Running"),
            JobPhase::Succeeded => write!(f, "Completed"),
            JobPhase::SucceededWithWarnings => write!(f, "Completed with warnings"),
            JobPhase::Failed => write!(f, "Failed"),
            JobPhase::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Payload of a [`JobEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobEventKind {
    /// Overall transfer progress, 0-100.
    Progress { percentage: u8 },
    /// One line of output, already trimmed.
    Log { line: String },
    DiskSpaceError { message: String },
    ValidationError { message: String },
    /// Terminal event. Always the last event of a job.
    Finished {
        outcome: JobOutcome,
        success: bool,
        status: String,
    },
}

/// Event emitted by a job's worker thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    /// Unique job identifier.
    pub job_id: String,
    /// Name of the schema being backed up.
    pub schema_name: String,
    #[serde(flatten)]
    pub kind: JobEventKind,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(job_id: &str, schema_name: &str, kind: JobEventKind) -> Self {
        Self {
            job_id: job_id.to_string(),
            schema_name: schema_name.to_string(),
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn progress(job_id: &str, schema_name: &str, percentage: u8) -> Self {
        Self::new(job_id, schema_name, JobEventKind::Progress { percentage })
    }

    pub fn log(job_id: &str, schema_name: &str, line: impl Into<String>) -> Self {
        Self::new(job_id, schema_name, JobEventKind::Log { line: line.into() })
    }

    pub fn finished(
        job_id: &str,
        schema_name: &str,
        outcome: JobOutcome,
        status: impl Into<String>,
    ) -> Self {
        Self::new(
            job_id,
            schema_name,
            JobEventKind::Finished {
                outcome,
                success: outcome.is_success(),
                status: status.into(),
            },
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, JobEventKind::Finished { .. })
    }

    /// The terminal outcome, if this is the terminal event.
    pub fn outcome(&self) -> Option<JobOutcome> {
        match self.kind {
            JobEventKind::Finished { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}
