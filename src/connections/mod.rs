//! Remote-execution transports
//!
//! A Connection reaches one host: it runs commands and moves files. Drivers
//! implement the [`Connection`] trait and are constructed through the closed
//! registry in [`new`], keyed by the `type` string from the manifest.
//! Timeouts surface as flags on the results, never as generic errors, so a
//! slow host is distinguishable from a broken one.

use std::collections::HashMap;

use crate::error::{Error, Result};

pub mod local;
pub mod ssh;

#[cfg(test)]
pub mod testing;

pub use local::Local;
pub use ssh::Ssh;

/// Default timeout for a single remote command, in seconds.
pub const DEFAULT_COMMAND_TIMEOUT: u64 = 60;

/// Default timeout for establishing a connection, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 300;

/// Options for running a command.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub command: String,
    /// Seconds; 0 means the driver default.
    pub timeout: u64,
}

/// Result of a command execution.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub applied: bool,
}

/// Options for copying a file to or from a host.
#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    pub source: String,
    pub destination: String,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub mode: Option<u32>,
    /// Seconds; 0 means the driver default.
    pub timeout: u64,
}

/// Options for acting on a single remote path.
#[derive(Debug, Clone, Default)]
pub struct FileOptions {
    pub path: String,
    /// Seconds; 0 means the driver default.
    pub timeout: u64,
}

/// Metadata about a remote file.
#[derive(Debug, Clone, Default)]
pub struct FileStat {
    pub name: String,
    pub kind: String,
    pub size: u64,
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
}

/// Result of a file operation.
#[derive(Debug, Clone, Default)]
pub struct FileResult {
    pub exists: bool,
    pub success: bool,
    pub timed_out: bool,
    pub applied: bool,
    pub info: Option<FileStat>,
}

/// Per-host transport. Implementations must be shareable across the
/// step worker and its inline notify execution.
pub trait Connection: Send + Sync {
    /// Establish the transport. Idempotent and lazy; drivers retry
    /// internally up to their connect timeout.
    fn connect(&self) -> Result<()>;

    /// Tear the transport down. Drivers without persistent state do nothing.
    fn close(&self) {}

    fn run_command(&self, opts: RunOptions) -> Result<RunResult>;

    fn file_info(&self, opts: FileOptions) -> Result<FileResult>;
    fn file_delete(&self, opts: FileOptions) -> Result<FileResult>;
    fn file_upload(&self, opts: CopyOptions) -> Result<FileResult>;
    fn file_download(&self, opts: CopyOptions) -> Result<FileResult>;
}

/// Build a connection from a driver key and its option map.
///
/// The registry is closed: adding a driver means implementing
/// [`Connection`] and adding a key here.
pub fn new(
    conn_type: &str,
    options: &HashMap<String, serde_yaml::Value>,
) -> Result<Box<dyn Connection>> {
    match conn_type {
        "" => Err(Error::UnsupportedDriver {
            kind: "connection",
            name: "(none)".to_string(),
        }),
        "local" => Ok(Box::new(Local::new(options)?)),
        "ssh" => Ok(Box::new(Ssh::new(options)?)),
        other => Err(Error::UnsupportedDriver {
            kind: "connection",
            name: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_rejects_unknown_driver() {
        let err = new("carrier-pigeon", &HashMap::new()).err().unwrap();
        assert!(matches!(
            err,
            Error::UnsupportedDriver {
                kind: "connection",
                ..
            }
        ));
    }

    #[test]
    fn registry_rejects_empty_driver() {
        assert!(new("", &HashMap::new()).is_err());
    }

    #[test]
    fn registry_builds_local() {
        assert!(new("local", &HashMap::new()).is_ok());
    }
}
