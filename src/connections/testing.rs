//! Scripted in-memory connection for exercising actions without a host.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::connections::{
    Connection, CopyOptions, FileOptions, FileResult, RunOptions, RunResult,
};
use crate::error::Result;

/// Replays queued command results in order and records everything the
/// action under test asked the transport to do.
#[derive(Default)]
pub struct Scripted {
    responses: Mutex<VecDeque<RunResult>>,
    commands: Mutex<Vec<String>>,
    uploads: Mutex<Vec<(CopyOptions, String)>>,
    deletes: Mutex<Vec<String>>,
}

impl Scripted {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result for the next command, FIFO.
    pub fn respond(&self, exit_code: i32, stdout: &str, stderr: &str) {
        self.responses.lock().unwrap().push_back(RunResult {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            timed_out: false,
            applied: exit_code == 0,
        });
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Uploads seen so far, with the staged file's content.
    pub fn uploads(&self) -> Vec<(CopyOptions, String)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

impl Connection for Scripted {
    fn connect(&self) -> Result<()> {
        Ok(())
    }

    fn run_command(&self, opts: RunOptions) -> Result<RunResult> {
        self.commands.lock().unwrap().push(opts.command);
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RunResult {
                exit_code: 0,
                applied: true,
                ..Default::default()
            }))
    }

    fn file_info(&self, _opts: FileOptions) -> Result<FileResult> {
        Ok(FileResult {
            exists: false,
            success: true,
            ..Default::default()
        })
    }

    fn file_delete(&self, opts: FileOptions) -> Result<FileResult> {
        self.deletes.lock().unwrap().push(opts.path);
        Ok(FileResult {
            exists: false,
            success: true,
            applied: true,
            ..Default::default()
        })
    }

    fn file_upload(&self, opts: CopyOptions) -> Result<FileResult> {
        let content = std::fs::read_to_string(&opts.source).unwrap_or_default();
        self.uploads.lock().unwrap().push((opts, content));
        Ok(FileResult {
            exists: true,
            success: true,
            applied: true,
            ..Default::default()
        })
    }

    fn file_download(&self, opts: CopyOptions) -> Result<FileResult> {
        self.uploads
            .lock()
            .unwrap()
            .push((opts, String::new()));
        Ok(FileResult {
            exists: true,
            success: true,
            applied: true,
            ..Default::default()
        })
    }
}
