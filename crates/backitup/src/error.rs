use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackitupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidLogFilter { filter: String, reason: String },
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to create schema directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read schema file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write schema file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete schema file '{path}': {source}")]
    DeleteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML in '{path}': {message}")]
    ParseYaml { path: PathBuf, message: String },

    #[error("Failed to serialize schema '{name}': {message}")]
    SerializeYaml { name: String, message: String },

    #[error("Schema file '{path}' is missing required key '{key}'")]
    MissingField { path: PathBuf, key: &'static str },

    #[error("Schema '{0}' not found")]
    NotFound(String),

    #[error("Schema file '{path}' holds '{found}', not '{expected}'")]
    NameMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("Invalid schema: {0}")]
    Invalid(String),
}

/// Failures inside a running job. They never leave the worker thread; the
/// supervisor turns them into a terminal `failed` event.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("{binary} command not found. Please ensure {binary} is installed and in your PATH.")]
    RsyncNotFound { binary: String },

    #[error("Failed to launch '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while supervising the sync process: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to start the job runtime: {0}")]
    Runtime(String),
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("The queue controller has stopped")]
    ControllerStopped,
}

pub type Result<T> = std::result::Result<T, BackitupError>;
