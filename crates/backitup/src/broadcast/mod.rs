//! Fan-out of job events to any number of presentation subscribers.

pub mod backup_events;

pub use backup_events::BackupEventBroadcaster;
