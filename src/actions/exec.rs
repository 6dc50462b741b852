//! The `exec` action: arbitrary commands with idempotence guards

use crate::connections::{Connection, RunOptions, RunResult};
use crate::error::Result;
use crate::options::{InputMap, Schema};

/// Decoded input for an `exec`, also the internal command primitive the
/// compound actions build on.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExecOptions {
    pub cmd: String,
    pub dir: String,
    pub env: Vec<String>,
    pub sudo: bool,
    pub timeout: u64,
    pub unless: String,
}

impl ExecOptions {
    fn from_input(input: &InputMap) -> Result<Self> {
        let mut schema = Schema::new("exec", input);
        let opts = Self {
            cmd: schema.required("cmd"),
            dir: schema.string("dir", ""),
            env: schema.string_list("env"),
            sudo: schema.bool("sudo", false),
            timeout: schema.u64("timeout", 0),
            unless: schema.string("unless", ""),
        };
        schema.finish()?;
        Ok(opts)
    }

    /// Shorthand for the internal single-command case.
    pub(crate) fn command(cmd: impl Into<String>, sudo: bool, timeout: u64) -> Self {
        Self {
            cmd: cmd.into(),
            sudo,
            timeout,
            ..Self::default()
        }
    }

    /// Wrap a raw command with the sudo, dir, and env prefixes.
    fn compose(&self, raw: &str) -> String {
        let mut cmd = raw.to_string();

        if self.sudo {
            cmd = format!("sudo {cmd}");
        }

        if !self.dir.is_empty() {
            cmd = format!("cd {} && {cmd}", self.dir);
        }

        for env in &self.env {
            cmd = format!("{env} && {cmd}");
        }

        cmd
    }
}

/// Run an `exec` step.
///
/// When `unless` is set it runs first under the same prefixes; exit 0
/// means the guard is satisfied and the main command is skipped with
/// `applied = false`.
pub fn exec_step(conn: &dyn Connection, input: &InputMap) -> Result<RunResult> {
    let opts = ExecOptions::from_input(input)?;
    log::info!("running command: {}", opts.compose(&opts.cmd));
    run(conn, &opts)
}

/// Internal command runner, shared by the step entry point and the
/// compound actions.
pub(crate) fn run(conn: &dyn Connection, opts: &ExecOptions) -> Result<RunResult> {
    if !opts.unless.is_empty() {
        let unless = opts.compose(&opts.unless);
        log::debug!("running unless command: {unless}");

        let mut guard = conn.run_command(RunOptions {
            command: unless,
            timeout: opts.timeout,
        })?;

        if guard.exit_code == 0 {
            guard.applied = false;
            return Ok(guard);
        }
    }

    let cmd = opts.compose(&opts.cmd);
    log::debug!("running command: {cmd}");
    conn.run_command(RunOptions {
        command: cmd,
        timeout: opts.timeout,
    })
}
