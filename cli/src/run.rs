//! The `run` command: queue schemas and drive the controller until idle.

use backitup::queue::{control_channel, FinishedJob};
use backitup::{BackitupError, EnqueueOutcome, JobOutcome, QueueController, Settings};
use log::{info, warn};

use crate::events::spawn_printer;

/// Returns `false` if any schema could not be queued or any job failed.
pub fn run(settings: &Settings, names: &[String], json: bool) -> Result<bool, BackitupError> {
    let mut controller = QueueController::from_settings(settings)?;
    let printer = spawn_printer(controller.broadcaster().subscribe(), json);

    let mut all_queued = true;
    for name in names {
        let outcome = controller.enqueue(name);
        if !json {
            println!("{}: {}", name, outcome);
        }
        if !matches!(
            outcome,
            EnqueueOutcome::Queued { .. } | EnqueueOutcome::AlreadyQueued
        ) {
            all_queued = false;
        }
    }

    let (handle, commands) = control_channel();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Interrupted, cancelling active backup");
        let _ = handle.cancel_active_job();
        let _ = handle.shutdown();
    }) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    controller.run_until_idle_with(&commands);

    let finished = controller.take_finished();
    // Dropping the controller closes the broadcaster and ends the printer.
    drop(controller);
    if printer.join().is_err() {
        warn!("Event printer panicked");
    }

    if !json {
        print_summary(&finished);
    }
    let any_failed = finished
        .iter()
        .any(|job| job.outcome == JobOutcome::Failed);
    Ok(all_queued && !any_failed)
}

fn print_summary(finished: &[FinishedJob]) {
    if finished.is_empty() {
        return;
    }
    println!();
    println!("Summary:");
    for job in finished {
        println!("  {:<24} {:<10} {}", job.schema_name, job.outcome, job.status);
    }
}
