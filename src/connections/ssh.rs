//! SSH connection driver
//!
//! Drives the OpenSSH client binaries (`ssh`/`scp`) in batch mode. Identity
//! options come from the connection's option map, with an optional `auth`
//! entry from the yak config file filling in whatever the map leaves out.

use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::connections::local::{effective_timeout, run_with_deadline};
use crate::connections::{
    Connection, CopyOptions, FileOptions, FileResult, FileStat, RunOptions, RunResult,
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT,
};
use crate::error::{Error, Result};
use crate::options::{InputMap, Schema};

/// Reaches a host over SSH.
#[derive(Debug)]
pub struct Ssh {
    host: String,
    user: String,
    port: u64,
    private_key: Option<String>,
    connect_timeout: u64,
    connected: AtomicBool,
}

impl Ssh {
    pub fn new(options: &InputMap) -> Result<Self> {
        let mut schema = Schema::new("ssh", options);
        let host = schema.required("host");
        let mut user = schema.string("user", "root");
        let mut port = schema.u64("port", 22);
        let mut private_key = schema.opt_string("private_key");
        let connect_timeout = schema.u64("timeout", DEFAULT_CONNECT_TIMEOUT);
        let auth = schema.string("auth", "");
        schema.finish()?;

        // An auth entry only fills fields the option map left at defaults.
        if !auth.is_empty() {
            let config = Config::find_and_load()?;
            let entry = Schema::new("ssh", &config.auth_entry(&auth)?.options);

            if !options.contains_key("user") {
                user = entry.string("user", &user);
            }
            if !options.contains_key("port") {
                port = entry.u64("port", port);
            }
            if private_key.is_none() {
                private_key = entry.opt_string("private_key");
            }
        }

        Ok(Self {
            host,
            user,
            port,
            private_key,
            connect_timeout,
            connected: AtomicBool::new(false),
        })
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
        ];

        if let Some(key) = &self.private_key {
            args.push("-i".to_string());
            args.push(key.clone());
        }

        args
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn ssh_command(&self, remote: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.args(self.base_args());
        cmd.arg("-p").arg(self.port.to_string());
        cmd.arg(self.destination());
        cmd.arg("--").arg(remote);
        cmd
    }

    fn run_remote(&self, remote: &str, timeout: u64) -> Result<RunResult> {
        let timeout = effective_timeout(timeout, DEFAULT_COMMAND_TIMEOUT);
        let (status, stdout, stderr, timed_out) =
            run_with_deadline(self.ssh_command(remote), timeout).map_err(|e| {
                Error::driver("ssh", format!("failed to execute ssh client: {e}"))
            })?;

        let exit_code = status.map_or(-1, |s| s.code().unwrap_or(-1));

        Ok(RunResult {
            exit_code,
            stdout,
            stderr,
            timed_out,
            applied: exit_code == 0 && !timed_out,
        })
    }

    fn scp(&self, source: &str, destination: &str, timeout: u64) -> Result<RunResult> {
        let mut cmd = Command::new("scp");
        cmd.args(self.base_args());
        cmd.arg("-P").arg(self.port.to_string());
        cmd.arg("-q");
        cmd.arg(source).arg(destination);

        let timeout = effective_timeout(timeout, DEFAULT_COMMAND_TIMEOUT);
        let (status, stdout, stderr, timed_out) = run_with_deadline(cmd, timeout)
            .map_err(|e| Error::driver("ssh", format!("failed to execute scp: {e}")))?;

        let exit_code = status.map_or(-1, |s| s.code().unwrap_or(-1));

        Ok(RunResult {
            exit_code,
            stdout,
            stderr,
            timed_out,
            applied: exit_code == 0 && !timed_out,
        })
    }

    /// Apply declared ownership/mode after a transfer landed.
    fn post_copy(&self, opts: &CopyOptions) -> Result<()> {
        let mut fixes = Vec::new();

        match (opts.uid, opts.gid) {
            (Some(uid), Some(gid)) => {
                fixes.push(format!("chown {uid}:{gid} \"{}\"", opts.destination));
            }
            (Some(uid), None) => fixes.push(format!("chown {uid} \"{}\"", opts.destination)),
            (None, Some(gid)) => fixes.push(format!("chgrp {gid} \"{}\"", opts.destination)),
            (None, None) => {}
        }

        if let Some(mode) = opts.mode {
            fixes.push(format!("chmod {mode:o} \"{}\"", opts.destination));
        }

        for fix in fixes {
            let rr = self.run_remote(&fix, opts.timeout)?;
            if rr.exit_code != 0 {
                return Err(Error::Transfer {
                    path: opts.destination.clone(),
                    detail: rr.stderr,
                    timed_out: rr.timed_out,
                });
            }
        }

        Ok(())
    }
}

impl Connection for Ssh {
    fn connect(&self) -> Result<()> {
        if self.connected.load(Ordering::Acquire) {
            return Ok(());
        }

        let deadline = Instant::now() + Duration::from_secs(self.connect_timeout);

        loop {
            let rr = self.run_remote("true", 15)?;
            if rr.exit_code == 0 {
                self.connected.store(true, Ordering::Release);
                return Ok(());
            }

            let last = if rr.stderr.is_empty() {
                format!("exit code {}", rr.exit_code)
            } else {
                rr.stderr
            };

            if Instant::now() >= deadline {
                return Err(Error::Connection {
                    host: self.host.clone(),
                    detail: last,
                    timed_out: true,
                });
            }

            std::thread::sleep(Duration::from_secs(2));
        }
    }

    fn run_command(&self, opts: RunOptions) -> Result<RunResult> {
        if opts.command.is_empty() {
            return Err(Error::driver("ssh", "a command is required"));
        }

        self.run_remote(&opts.command, opts.timeout)
    }

    fn file_info(&self, opts: FileOptions) -> Result<FileResult> {
        let probe = format!("stat -c '%F:%s:%u:%g:%a' \"{}\"", opts.path);
        let rr = self.run_remote(&probe, opts.timeout)?;

        if rr.exit_code != 0 {
            return Ok(FileResult {
                exists: false,
                success: true,
                timed_out: rr.timed_out,
                ..Default::default()
            });
        }

        Ok(FileResult {
            exists: true,
            success: true,
            info: parse_stat(&opts.path, &rr.stdout),
            ..Default::default()
        })
    }

    fn file_delete(&self, opts: FileOptions) -> Result<FileResult> {
        let probe = self.run_remote(&format!("test -e \"{}\"", opts.path), opts.timeout)?;
        if probe.exit_code != 0 {
            return Ok(FileResult {
                exists: false,
                success: true,
                applied: false,
                timed_out: probe.timed_out,
                ..Default::default()
            });
        }

        let rr = self.run_remote(&format!("rm -f \"{}\"", opts.path), opts.timeout)?;
        if rr.exit_code != 0 {
            return Err(Error::Transfer {
                path: opts.path.clone(),
                detail: rr.stderr,
                timed_out: rr.timed_out,
            });
        }

        Ok(FileResult {
            exists: false,
            success: true,
            applied: true,
            ..Default::default()
        })
    }

    fn file_upload(&self, opts: CopyOptions) -> Result<FileResult> {
        let remote = format!("{}:{}", self.destination(), opts.destination);
        let rr = self.scp(&opts.source, &remote, opts.timeout)?;

        if rr.exit_code != 0 {
            return Ok(FileResult {
                exists: false,
                success: false,
                timed_out: rr.timed_out,
                ..Default::default()
            });
        }

        self.post_copy(&opts)?;

        Ok(FileResult {
            exists: true,
            success: true,
            applied: true,
            ..Default::default()
        })
    }

    fn file_download(&self, opts: CopyOptions) -> Result<FileResult> {
        let remote = format!("{}:{}", self.destination(), opts.source);
        let rr = self.scp(&remote, &opts.destination, opts.timeout)?;

        if rr.exit_code != 0 {
            return Ok(FileResult {
                exists: false,
                success: false,
                timed_out: rr.timed_out,
                ..Default::default()
            });
        }

        Ok(FileResult {
            exists: true,
            success: true,
            applied: true,
            ..Default::default()
        })
    }
}

fn parse_stat(path: &str, stdout: &str) -> Option<FileStat> {
    let mut parts = stdout.trim().split(':');
    let kind = match parts.next()? {
        "directory" => "directory",
        "symbolic link" => "symlink",
        _ => "file",
    };

    Some(FileStat {
        name: path.to_string(),
        kind: kind.to_string(),
        size: parts.next()?.parse().ok()?,
        uid: parts.next()?.parse().ok()?,
        gid: parts.next()?.parse().ok()?,
        mode: u32::from_str_radix(parts.next()?, 8).ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Value;
    use std::collections::HashMap;

    fn options(pairs: &[(&str, Value)]) -> InputMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn requires_a_host() {
        let err = Ssh::new(&HashMap::new()).unwrap_err();
        assert!(matches!(err, Error::MissingInput { action: "ssh", .. }));
    }

    #[test]
    fn defaults_user_and_port() {
        let ssh = Ssh::new(&options(&[("host", Value::String("10.0.0.5".into()))])).unwrap();
        assert_eq!(ssh.destination(), "root@10.0.0.5");
        assert_eq!(ssh.port, 22);
    }

    #[test]
    fn honors_declared_identity() {
        let ssh = Ssh::new(&options(&[
            ("host", Value::String("db1".into())),
            ("user", Value::String("deploy".into())),
            ("port", Value::Number(2222.into())),
            ("private_key", Value::String("/keys/id_rsa".into())),
        ]))
        .unwrap();

        assert_eq!(ssh.destination(), "deploy@db1");
        assert_eq!(ssh.port, 2222);
        assert_eq!(ssh.private_key.as_deref(), Some("/keys/id_rsa"));
    }

    #[test]
    fn parses_stat_output() {
        let info = parse_stat("/tmp/x", "regular file:14:0:0:644").unwrap();
        assert_eq!(info.kind, "file");
        assert_eq!(info.size, 14);
        assert_eq!(info.mode, 0o644);
    }
}
