//! Serialized execution of backup jobs.
//!
//! The [`QueueController`] owns the pending queue and the single active job
//! slot. Both are only touched on the thread that drives the controller;
//! workers talk back exclusively through the job event channel.

pub mod controller;
pub mod handle;

pub use controller::{QueueController, QueueTiming};
pub use handle::{
    control_channel, ControlCommand, EnqueueOutcome, FinishedJob, QueueHandle, QueueStatus,
};
