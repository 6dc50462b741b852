//! The `apt.source` action: plain apt source list files

use std::io::Write;

use reconcile::{DeclaredState, Reconcile};

use crate::actions::exec::{self, ExecOptions};
use crate::actions::file::upload_and_move;
use crate::actions::{run_reconciler, Base};
use crate::connections::{Connection, CopyOptions};
use crate::error::{Error, Result};
use crate::options::{InputMap, Schema};

pub fn converge_step(conn: &dyn Connection, input: &InputMap) -> Result<bool> {
    let mut schema = Schema::new("apt.source", input);
    let base = Base::decode(&mut schema);
    let source = AptSource {
        conn,
        uri: schema.required("uri"),
        distribution: schema.required("distribution"),
        component: schema.string("component", ""),
        include_src: schema.bool("include_src", false),
        refresh: schema.bool("refresh", true),
        base,
    };
    schema.finish()?;

    run_reconciler(&source)
}

struct AptSource<'a> {
    conn: &'a dyn Connection,
    base: Base,
    uri: String,
    distribution: String,
    component: String,
    include_src: bool,
    refresh: bool,
}

impl AptSource<'_> {
    fn path(&self) -> String {
        format!("/etc/apt/sources.list.d/{}.list", self.base.name)
    }

    fn entry(&self) -> String {
        format!("deb {} {} {}", self.uri, self.distribution, self.component)
    }

    fn src_entry(&self) -> String {
        format!(
            "deb-src {} {} {}",
            self.uri, self.distribution, self.component
        )
    }

    fn run_checked(&self, cmd: String) -> Result<()> {
        let eo = ExecOptions::command(cmd, self.base.sudo, self.base.timeout);
        let rr = exec::run(self.conn, &eo)?;
        if rr.exit_code != 0 {
            return Err(Error::RemoteCommand {
                resource: format!("apt.source {}", self.base.name),
                stderr: rr.stderr,
            });
        }
        Ok(())
    }
}

impl Reconcile for AptSource<'_> {
    type Error = Error;

    fn kind(&self) -> &'static str {
        "apt.source"
    }

    fn name(&self) -> &str {
        &self.base.name
    }

    fn state(&self) -> &DeclaredState {
        &self.base.state
    }

    fn exists(&self) -> Result<bool> {
        let eo = ExecOptions::command(
            format!(r#"cat "{}""#, self.path()),
            self.base.sudo,
            self.base.timeout,
        );

        let rr = exec::run(self.conn, &eo)?;
        if rr.exit_code != 0 {
            return Ok(false);
        }

        // The entry must match line-for-line: a changed uri, distribution,
        // or component reads as absent and gets rewritten.
        let entry = self.entry();
        let src_entry = self.src_entry();
        let mut found = false;
        let mut src_found = false;
        for line in rr.stdout.lines() {
            if line == entry {
                found = true;
            }
            if line == src_entry {
                src_found = true;
            }
        }

        if found && self.include_src && !src_found {
            return Ok(false);
        }

        Ok(found)
    }

    fn create(&self) -> Result<()> {
        let mut staged = tempfile::NamedTempFile::new()
            .map_err(|e| Error::driver("apt.source", e))?;

        let mut content = self.entry();
        if self.include_src {
            content.push('\n');
            content.push_str(&self.src_entry());
        }
        staged
            .write_all(content.as_bytes())
            .map_err(|e| Error::driver("apt.source", e))?;

        let path = staged.path().display().to_string();
        let copy = CopyOptions {
            source: path.clone(),
            destination: path,
            timeout: self.base.timeout,
            ..CopyOptions::default()
        };
        let eo = ExecOptions::command(String::new(), self.base.sudo, self.base.timeout);

        upload_and_move(self.conn, copy, eo, &self.path())?;

        if self.refresh {
            self.run_checked("apt-get update -qq".to_string())?;
        }

        Ok(())
    }

    fn delete(&self) -> Result<()> {
        self.run_checked(format!(r#"rm "{}""#, self.path()))?;

        if self.refresh {
            self.run_checked("apt-get update -qq".to_string())?;
        }

        Ok(())
    }
}
