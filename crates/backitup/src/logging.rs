//! Tracing subscriber setup.
//!
//! Library code logs through both `tracing` and the `log` facade; `init`
//! installs a single fmt subscriber writing to stderr and forwards `log`
//! records into it.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::ConfigError;

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `default_filter` when set. Calling this more than
/// once is a no-op.
pub fn init(default_filter: &str) -> Result<(), ConfigError> {
    if INITIALIZED.get().is_some() {
        return Ok(());
    }

    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(from_env) if !from_env.trim().is_empty() => parse_filter(&from_env)?,
        _ => parse_filter(default_filter)?,
    };

    // Another subscriber (e.g. a test harness) may already own the global
    // slot; keep it rather than failing.
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let _ = INITIALIZED.set(());
    Ok(())
}

fn parse_filter(directives: &str) -> Result<EnvFilter, ConfigError> {
    EnvFilter::try_new(directives).map_err(|e| ConfigError::InvalidLogFilter {
        filter: directives.to_string(),
        reason: e.to_string(),
    })
}
