//! The `apt.pkg` action: package state via apt-get

use std::sync::LazyLock;

use regex::Regex;

use reconcile::{DeclaredState, Reconcile};

use crate::actions::exec::{self, ExecOptions};
use crate::actions::{run_reconciler, Base};
use crate::connections::Connection;
use crate::error::{Error, Result};
use crate::options::{InputMap, Schema};

static INSTALLED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Installed: (.+)").unwrap());
static CANDIDATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Candidate: (.+)").unwrap());

const APT_ENV: [&str; 3] = [
    "DEBIAN_FRONTEND=noninteractive",
    "APT_LISTBUGS_FRONTEND=none",
    "APT_LISTCHANGES_FRONTEND=none",
];

pub fn converge_step(conn: &dyn Connection, input: &InputMap) -> Result<bool> {
    let mut schema = Schema::new("apt.pkg", input);
    let base = Base::decode(&mut schema);
    schema.finish()?;

    run_reconciler(&AptPkg { conn, base })
}

struct AptPkg<'a> {
    conn: &'a dyn Connection,
    base: Base,
}

impl AptPkg<'_> {
    fn apt_exec(&self, cmd: String) -> ExecOptions {
        ExecOptions {
            cmd,
            env: APT_ENV.iter().map(ToString::to_string).collect(),
            sudo: self.base.sudo,
            timeout: self.base.timeout,
            ..ExecOptions::default()
        }
    }
}

impl Reconcile for AptPkg<'_> {
    type Error = Error;

    fn kind(&self) -> &'static str {
        "apt.pkg"
    }

    fn name(&self) -> &str {
        &self.base.name
    }

    fn state(&self) -> &DeclaredState {
        &self.base.state
    }

    fn exists(&self) -> Result<bool> {
        let eo = ExecOptions::command(
            format!("apt-cache policy {}", self.base.name),
            self.base.sudo,
            self.base.timeout,
        );
        let rr = exec::run(self.conn, &eo)?;

        // An unknown package prints nothing at all.
        if rr.stdout.is_empty() {
            return Ok(false);
        }

        let (installed, _candidate) = parse_policy(&rr.stdout);
        // TODO: compare candidate against installed so `latest` can skip
        // the reinstall when no newer version is published.

        match &self.base.state {
            DeclaredState::Pinned(version) => Ok(installed == *version),
            _ => Ok(installed != "(none)"),
        }
    }

    fn create(&self) -> Result<()> {
        let spec = match &self.base.state {
            DeclaredState::Pinned(version) => format!("{}={version}", self.base.name),
            _ => self.base.name.clone(),
        };

        let eo = self.apt_exec(format!(
            "apt-get install -y --allow-downgrades --allow-remove-essential \
             --allow-change-held-packages -o DPkg::Options::=--force-confold {spec}"
        ));

        let rr = exec::run(self.conn, &eo)?;
        if rr.exit_code != 0 {
            return Err(Error::RemoteCommand {
                resource: format!("apt.pkg {}", self.base.name),
                stderr: rr.stderr,
            });
        }

        Ok(())
    }

    fn delete(&self) -> Result<()> {
        let eo = self.apt_exec(format!("apt-get purge -q -y {}", self.base.name));

        let rr = exec::run(self.conn, &eo)?;
        if rr.exit_code != 0 {
            return Err(Error::RemoteCommand {
                resource: format!("apt.pkg {}", self.base.name),
                stderr: rr.stderr,
            });
        }

        Ok(())
    }

    fn refresh_when_present(&self) -> bool {
        matches!(self.base.state, DeclaredState::Latest)
    }
}

/// Pull the installed and candidate versions out of `apt-cache policy`.
fn parse_policy(stdout: &str) -> (String, String) {
    let grab = |re: &Regex| {
        re.captures(stdout)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default()
    };
    (grab(&INSTALLED), grab(&CANDIDATE))
}
