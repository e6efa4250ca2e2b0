//! Backup event broadcaster for real-time job status streaming.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::job::JobEvent;

/// Broadcasts job events delivered by the queue controller.
///
/// A slow subscriber that falls more than `capacity` events behind sees
/// `RecvError::Lagged` and skips ahead; the controller never waits on it.
#[derive(Clone)]
pub struct BackupEventBroadcaster {
    sender: Arc<broadcast::Sender<JobEvent>>,
}

impl BackupEventBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, event: JobEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber for job events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BackupEventBroadcaster {
    fn default() -> Self {
        Self::new(1000)
    }
}
