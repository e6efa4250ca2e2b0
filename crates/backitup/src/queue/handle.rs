//! Command surface for a controller running on another thread.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use serde::Serialize;

use crate::error::QueueError;
use crate::job::JobOutcome;

/// Result of asking the controller to queue a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum EnqueueOutcome {
    /// Appended; `position` is 1-based within the pending queue.
    Queued { position: usize },
    /// The name is already pending. The queue is unchanged.
    AlreadyQueued,
    /// The schema currently fails path validation and was not queued.
    Invalid { problems: Vec<String> },
    /// No schema record exists under that name.
    NotFound,
}

impl EnqueueOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, EnqueueOutcome::Queued { .. })
    }
}

impl std::fmt::Display for EnqueueOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnqueueOutcome::Queued { position } => write!(f, "queued at position {}", position),
            EnqueueOutcome::AlreadyQueued => write!(f, "already queued"),
            EnqueueOutcome::Invalid { problems } => {
                write!(f, "invalid paths: {}", problems.join(", "))
            }
            EnqueueOutcome::NotFound => write!(f, "not found"),
        }
    }
}

/// Snapshot of the controller's queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub pending: Vec<String>,
    pub active: Option<String>,
}

/// A job that reached its terminal event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishedJob {
    pub job_id: String,
    pub schema_name: String,
    pub outcome: JobOutcome,
    pub status: String,
}

/// Commands accepted by [`super::QueueController::run`].
#[derive(Debug)]
pub enum ControlCommand {
    Enqueue {
        name: String,
        reply: Sender<EnqueueOutcome>,
    },
    CancelActive {
        reply: Sender<bool>,
    },
    Status {
        reply: Sender<QueueStatus>,
    },
    /// Cancel the active job, wait for its terminal event, drop anything
    /// still pending, and return from `run`.
    Shutdown,
}

/// Creates a handle and the receiver the controller loop reads from.
pub fn control_channel() -> (QueueHandle, Receiver<ControlCommand>) {
    let (tx, rx) = unbounded();
    (QueueHandle { tx }, rx)
}

/// Cloneable client for a running controller.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    tx: Sender<ControlCommand>,
}

impl QueueHandle {
    pub fn enqueue(&self, name: &str) -> Result<EnqueueOutcome, QueueError> {
        self.request(|reply| ControlCommand::Enqueue {
            name: name.to_string(),
            reply,
        })
    }

    /// Returns whether a job was active.
    pub fn cancel_active_job(&self) -> Result<bool, QueueError> {
        self.request(|reply| ControlCommand::CancelActive { reply })
    }

    pub fn status(&self) -> Result<QueueStatus, QueueError> {
        self.request(|reply| ControlCommand::Status { reply })
    }

    /// Asks the controller to stop. Does not wait for it.
    pub fn shutdown(&self) -> Result<(), QueueError> {
        self.tx
            .send(ControlCommand::Shutdown)
            .map_err(|_| QueueError::ControllerStopped)
    }

    fn request<T>(
        &self,
        build: impl FnOnce(Sender<T>) -> ControlCommand,
    ) -> Result<T, QueueError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.tx
            .send(build(reply_tx))
            .map_err(|_| QueueError::ControllerStopped)?;
        reply_rx.recv().map_err(|_| QueueError::ControllerStopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_round_trip() {
        let (handle, commands) = control_channel();
        let server = std::thread::spawn(move || {
            if let Ok(ControlCommand::Status { reply }) = commands.recv() {
                let _ = reply.send(QueueStatus {
                    pending: vec!["docs".to_string()],
                    active: None,
                });
            }
        });

        let status = handle.status().unwrap();
        assert_eq!(status.pending, vec!["docs"]);
        server.join().unwrap();
    }

    #[test]
    fn test_stopped_controller() {
        let (handle, commands) = control_channel();
        drop(commands);
        assert!(matches!(
            handle.enqueue("docs"),
            Err(QueueError::ControllerStopped)
        ));
        assert!(handle.shutdown().is_err());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(
            EnqueueOutcome::Queued { position: 2 }.to_string(),
            "queued at position 2"
        );
        assert_eq!(
            EnqueueOutcome::Invalid {
                problems: vec!["Source: /a".to_string(), "Destination: /b".to_string()]
            }
            .to_string(),
            "invalid paths: Source: /a, Destination: /b"
        );
        assert!(!EnqueueOutcome::AlreadyQueued.is_queued());
    }

    #[test]
    fn test_outcome_json() {
        let json = serde_json::to_value(EnqueueOutcome::Queued { position: 1 }).unwrap();
        assert_eq!(json["result"], "queued");
        assert_eq!(json["position"], 1);
    }
}
