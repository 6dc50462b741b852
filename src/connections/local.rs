//! Local connection driver - runs commands through a shell on this host

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::connections::{
    Connection, CopyOptions, FileOptions, FileResult, FileStat, RunOptions, RunResult,
    DEFAULT_COMMAND_TIMEOUT,
};
use crate::error::{Error, Result};
use crate::options::{InputMap, Schema};

const DEFAULT_SHELL: &str = "/bin/bash";

/// Runs everything on the local host through a configurable shell.
#[derive(Debug, Clone)]
pub struct Local {
    shell: String,
}

impl Local {
    pub fn new(options: &InputMap) -> Result<Self> {
        let schema = Schema::new("local", options);
        let shell = schema.string("shell", DEFAULT_SHELL);
        schema.finish()?;

        Ok(Self { shell })
    }
}

impl Connection for Local {
    fn connect(&self) -> Result<()> {
        Ok(())
    }

    fn run_command(&self, opts: RunOptions) -> Result<RunResult> {
        if opts.command.is_empty() {
            return Err(Error::driver("local", "a command is required"));
        }

        let timeout = effective_timeout(opts.timeout, DEFAULT_COMMAND_TIMEOUT);

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(&opts.command);

        let (status, stdout, stderr, timed_out) = run_with_deadline(cmd, timeout)
            .map_err(|e| Error::driver("local", format!("failed to execute shell: {e}")))?;

        let exit_code = status.map_or(-1, |s| s.code().unwrap_or(-1));

        Ok(RunResult {
            exit_code,
            stdout,
            stderr,
            timed_out,
            applied: exit_code == 0 && !timed_out,
        })
    }

    fn file_info(&self, opts: FileOptions) -> Result<FileResult> {
        let path = Path::new(&opts.path);
        if !path.exists() {
            return Ok(FileResult {
                exists: false,
                success: true,
                ..Default::default()
            });
        }

        let meta = std::fs::symlink_metadata(path).map_err(|e| Error::Transfer {
            path: opts.path.clone(),
            detail: e.to_string(),
            timed_out: false,
        })?;

        Ok(FileResult {
            exists: true,
            success: true,
            info: Some(stat_from_metadata(&opts.path, &meta)),
            ..Default::default()
        })
    }

    fn file_delete(&self, opts: FileOptions) -> Result<FileResult> {
        let path = Path::new(&opts.path);
        if !path.exists() {
            return Ok(FileResult {
                exists: false,
                success: true,
                applied: false,
                ..Default::default()
            });
        }

        std::fs::remove_file(path).map_err(|e| Error::Transfer {
            path: opts.path.clone(),
            detail: e.to_string(),
            timed_out: false,
        })?;

        Ok(FileResult {
            exists: false,
            success: true,
            applied: true,
            ..Default::default()
        })
    }

    fn file_upload(&self, opts: CopyOptions) -> Result<FileResult> {
        copy_local(&opts)
    }

    fn file_download(&self, opts: CopyOptions) -> Result<FileResult> {
        copy_local(&opts)
    }
}

/// Locally, upload and download are the same copy.
///
/// Reconcilers staging through a scratch file pass `source ==
/// destination`; copying a path onto itself truncates it before the
/// read, so the copy is skipped and only ownership applies.
fn copy_local(opts: &CopyOptions) -> Result<FileResult> {
    if !same_file(&opts.source, &opts.destination) {
        std::fs::copy(&opts.source, &opts.destination).map_err(|e| Error::Transfer {
            path: opts.destination.clone(),
            detail: e.to_string(),
            timed_out: false,
        })?;
    }

    apply_ownership(&opts.destination, opts.uid, opts.gid, opts.mode)?;

    Ok(FileResult {
        exists: true,
        success: true,
        applied: true,
        ..Default::default()
    })
}

fn same_file(source: &str, destination: &str) -> bool {
    if source == destination {
        return true;
    }

    match (
        std::fs::canonicalize(source),
        std::fs::canonicalize(destination),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(unix)]
fn apply_ownership(
    path: &str,
    uid: Option<u32>,
    gid: Option<u32>,
    mode: Option<u32>,
) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let wrap = |e: std::io::Error| Error::Transfer {
        path: path.to_string(),
        detail: e.to_string(),
        timed_out: false,
    };

    if uid.is_some() || gid.is_some() {
        std::os::unix::fs::chown(path, uid, gid).map_err(wrap)?;
    }

    if let Some(mode) = mode {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(wrap)?;
    }

    Ok(())
}

#[cfg(not(unix))]
fn apply_ownership(
    _path: &str,
    _uid: Option<u32>,
    _gid: Option<u32>,
    _mode: Option<u32>,
) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn stat_from_metadata(path: &str, meta: &std::fs::Metadata) -> FileStat {
    use std::os::unix::fs::MetadataExt;

    let kind = if meta.is_dir() {
        "directory"
    } else if meta.file_type().is_symlink() {
        "symlink"
    } else {
        "file"
    };

    FileStat {
        name: path.to_string(),
        kind: kind.to_string(),
        size: meta.len(),
        uid: meta.uid(),
        gid: meta.gid(),
        mode: meta.mode() & 0o7777,
    }
}

#[cfg(not(unix))]
fn stat_from_metadata(path: &str, meta: &std::fs::Metadata) -> FileStat {
    FileStat {
        name: path.to_string(),
        kind: if meta.is_dir() { "directory" } else { "file" }.to_string(),
        size: meta.len(),
        ..Default::default()
    }
}

pub(crate) fn effective_timeout(requested: u64, default: u64) -> Duration {
    Duration::from_secs(if requested > 0 { requested } else { default })
}

/// Run a child process, killing it when the deadline passes.
///
/// Returns (status, stdout, stderr, timed_out). Status is None only when
/// the child was killed for exceeding the deadline.
pub(crate) fn run_with_deadline(
    mut cmd: Command,
    timeout: Duration,
) -> std::io::Result<(Option<std::process::ExitStatus>, String, String, bool)> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn()?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }

        if Instant::now() >= deadline {
            kill_and_reap(&mut child);
            break None;
        }

        thread::sleep(Duration::from_millis(25));
    };

    let out = stdout.join().unwrap_or_default();
    let err = stderr.join().unwrap_or_default();

    Ok((
        status,
        out.trim_end().to_string(),
        err.trim_end().to_string(),
        status.is_none(),
    ))
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain(pipe: Option<impl Read + Send + 'static>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}
