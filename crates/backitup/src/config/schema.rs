use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "BackItUp";

/// Application settings. Every field has a default, so an empty file (or no
/// file at all) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
    #[serde(default = "default_rsync_binary")]
    pub rsync_binary: String,
    #[serde(default)]
    pub rsync_extra_args: Vec<String>,
    #[serde(default = "default_min_free_bytes")]
    pub min_free_bytes: u64,
    #[serde(default = "default_vanished_exit_code")]
    pub vanished_exit_code: i32,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_after_job_delay_ms")]
    pub after_job_delay_ms: u64,
    #[serde(default)]
    pub terminate_grace_ms: Option<u64>,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

/// `<platform config dir>/BackItUp/Config`, or a relative `BackItUp/Config`
/// when the platform has no config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_NAME).join("Config"))
        .unwrap_or_else(|| PathBuf::from(APP_NAME).join("Config"))
}

/// `<platform config dir>/BackItUp/settings.yaml`. Lives next to the schema
/// directory, not inside it.
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from(APP_NAME))
        .join("settings.yaml")
}

fn default_rsync_binary() -> String {
    "rsync".to_string()
}

fn default_min_free_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_vanished_exit_code() -> i32 {
    24
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_retry_delay_ms() -> u64 {
    10
}

fn default_after_job_delay_ms() -> u64 {
    100
}

fn default_event_capacity() -> usize {
    1000
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            rsync_binary: default_rsync_binary(),
            rsync_extra_args: Vec::new(),
            min_free_bytes: default_min_free_bytes(),
            vanished_exit_code: default_vanished_exit_code(),
            tick_interval_ms: default_tick_interval_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            after_job_delay_ms: default_after_job_delay_ms(),
            terminate_grace_ms: None,
            event_capacity: default_event_capacity(),
            log_filter: default_log_filter(),
        }
    }
}

impl Settings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn after_job_delay(&self) -> Duration {
        Duration::from_millis(self.after_job_delay_ms)
    }

    pub fn terminate_grace(&self) -> Option<Duration> {
        self.terminate_grace_ms.map(Duration::from_millis)
    }
}
