//! The rsync invocation for a schema.

use std::io;
use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::error::JobError;
use crate::schema::Schema;

/// Archive mode, machine-parsable overall progress, and no incremental
/// recursion so the progress total is known up front.
pub const BASE_FLAGS: [&str; 3] = ["-a", "--info=progress2", "--no-i-r"];

/// Program plus arguments: base flags, extra flags, every source in order,
/// then the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsyncCommand {
    program: String,
    args: Vec<String>,
}

impl RsyncCommand {
    pub fn new(program: &str, extra_args: &[String], schema: &Schema) -> Self {
        let args = BASE_FLAGS
            .iter()
            .map(|flag| flag.to_string())
            .chain(extra_args.iter().cloned())
            .chain(schema.sources.iter().cloned())
            .chain(std::iter::once(schema.destination.clone()))
            .collect();

        Self {
            program: program.to_string(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The command line as shown to the user.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Launches the process with stdout and stderr piped.
    pub(crate) fn spawn(&self) -> Result<Child, JobError> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => JobError::RsyncNotFound {
                    binary: self.program.clone(),
                },
                _ => JobError::Spawn {
                    binary: self.program.clone(),
                    source: e,
                },
            })
    }
}
