//! Error taxonomy for manifest loading, validation, and execution
//!
//! Manifest-level errors (`Read`, `Parse`, `Validation`) are fatal before
//! any task runs. Per-host errors during `run` are logged and counted but
//! never abort sibling hosts.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to parse YAML in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("unable to connect to {host}{}: {detail}", if *.timed_out { " (timed out)" } else { "" })]
    Connection {
        host: String,
        detail: String,
        timed_out: bool,
    },

    #[error("{resource}: remote command failed: {stderr}")]
    RemoteCommand { resource: String, stderr: String },

    #[error("transfer failed for {path}{}: {detail}", if *.timed_out { " (timed out)" } else { "" })]
    Transfer {
        path: String,
        detail: String,
        timed_out: bool,
    },

    #[error("action {0} not supported")]
    UnsupportedAction(String),

    #[error("unsupported {kind} driver: {name}")]
    UnsupportedDriver { kind: &'static str, name: String },

    #[error("{action}: missing required input: {}", fields.join(", "))]
    MissingInput {
        action: &'static str,
        fields: Vec<String>,
    },

    #[error("{context}: {detail}")]
    Driver { context: String, detail: String },
}

impl Error {
    /// Wrap a driver-level failure with the name of the thing being driven.
    pub fn driver(context: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::Driver {
            context: context.into(),
            detail: detail.to_string(),
        }
    }
}

/// Herd-level consistency violations. Each names the exact offender.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("duplicate notifier detected: {0}")]
    DuplicateNotifier(String),

    #[error("duplicate step detected: {0}")]
    DuplicateStep(String),

    #[error("duplicate target detected: {0}")]
    DuplicateTarget(String),

    #[error("duplicate connection detected: {0}")]
    DuplicateConnection(String),

    #[error("invalid task name: {0}")]
    InvalidTaskName(String),

    #[error("missing notifier: {0}")]
    MissingNotifier(String),

    #[error("task {0} not found")]
    TaskNotFound(String),

    #[error("target {0} not found")]
    TargetNotFound(String),

    #[error("connection for target {0} not found")]
    ConnectionNotFound(String),

    #[error("unable to find notifier {0}")]
    NotifierNotFound(String),
}
