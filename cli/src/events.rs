//! Prints job events from the broadcaster as they arrive.

use std::thread::{self, JoinHandle};

use backitup::{JobEvent, JobEventKind};
use log::{debug, warn};
use tokio::sync::broadcast::{self, error::RecvError};

/// Spawns a thread that prints every event until the broadcaster closes.
pub fn spawn_printer(mut rx: broadcast::Receiver<JobEvent>, json: bool) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match rx.blocking_recv() {
            Ok(event) => print_event(&event, json),
            Err(RecvError::Lagged(n)) => warn!("Event printer lagged, missed {} events", n),
            Err(RecvError::Closed) => {
                debug!("Broadcaster closed, stopping event printer");
                break;
            }
        }
    })
}

fn print_event(event: &JobEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize event: {}", e),
        }
        return;
    }

    if let Some(line) = render(event) {
        println!("{}", line);
    }
}

fn render(event: &JobEvent) -> Option<String> {
    let name = &event.schema_name;
    let text = match &event.kind {
        JobEventKind::Progress { percentage } => format!("[{}] {:>3}%", name, percentage),
        // Progress lines are already shown as percentages.
        JobEventKind::Log { line } if backitup::job::parse_progress_percent(line).is_some() => {
            return None;
        }
        JobEventKind::Log { line } => format!("[{}] {}", name, line),
        JobEventKind::DiskSpaceError { message } => format!("[{}] disk space: {}", name, message),
        JobEventKind::ValidationError { message } => format!("[{}] validation: {}", name, message),
        JobEventKind::Finished {
            outcome, status, ..
        } => format!("[{}] {} ({})", name, status, outcome),
    };
    Some(text)
}
