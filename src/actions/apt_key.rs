//! The `apt.key` action: trusted apt signing keys

use std::io::Write;

use reconcile::{DeclaredState, Reconcile};

use crate::actions::exec::{self, ExecOptions};
use crate::actions::{run_reconciler, Base};
use crate::connections::{Connection, CopyOptions, FileOptions};
use crate::error::{Error, Result};
use crate::options::{InputMap, Schema};

pub fn converge_step(conn: &dyn Connection, input: &InputMap) -> Result<bool> {
    let mut schema = Schema::new("apt.key", input);
    let base = Base::decode(&mut schema);
    let key_server = schema.string("key_server", "");
    let remote_key_file = schema.string("remote_key_file", "");
    schema.finish()?;

    if key_server.is_empty() && remote_key_file.is_empty() {
        return Err(Error::driver(
            "apt.key",
            format!(
                "{}: one of key_server or remote_key_file must be set",
                base.name
            ),
        ));
    }

    run_reconciler(&AptKey {
        conn,
        base,
        key_server,
        remote_key_file,
    })
}

struct AptKey<'a> {
    conn: &'a dyn Connection,
    base: Base,
    key_server: String,
    remote_key_file: String,
}

impl AptKey<'_> {
    /// Download the public key, stage it on the host, and add it.
    fn add_from_remote_file(&self) -> Result<()> {
        let key = fetch_key(&self.remote_key_file)?;

        let mut staged = tempfile::NamedTempFile::new()
            .map_err(|e| Error::driver("apt.key", e))?;
        staged
            .write_all(key.as_bytes())
            .map_err(|e| Error::driver("apt.key", e))?;

        let path = staged.path().display().to_string();
        let fr = self.conn.file_upload(CopyOptions {
            source: path.clone(),
            destination: path.clone(),
            timeout: self.base.timeout,
            ..CopyOptions::default()
        })?;
        if !fr.success {
            return Err(Error::Transfer {
                path,
                detail: "unable to stage key on host".to_string(),
                timed_out: fr.timed_out,
            });
        }

        let eo = ExecOptions::command(
            format!("apt-key add {path}"),
            self.base.sudo,
            self.base.timeout,
        );
        let rr = exec::run(self.conn, &eo)?;
        if rr.exit_code != 0 {
            return Err(Error::RemoteCommand {
                resource: format!("apt.key {}", self.base.name),
                stderr: rr.stderr,
            });
        }

        let fr = self.conn.file_delete(FileOptions {
            path: path.clone(),
            timeout: self.base.timeout,
        })?;
        if !fr.success {
            return Err(Error::Transfer {
                path,
                detail: "unable to delete staged key from host".to_string(),
                timed_out: fr.timed_out,
            });
        }

        Ok(())
    }

    fn add_from_key_server(&self) -> Result<()> {
        let eo = ExecOptions::command(
            format!(
                "apt-key adv --keyserver {} --recv-keys {}",
                self.key_server, self.base.name
            ),
            self.base.sudo,
            self.base.timeout,
        );

        let rr = exec::run(self.conn, &eo)?;
        if rr.exit_code != 0 {
            return Err(Error::RemoteCommand {
                resource: format!("apt.key {}", self.base.name),
                stderr: rr.stderr,
            });
        }

        Ok(())
    }
}

impl Reconcile for AptKey<'_> {
    type Error = Error;

    fn kind(&self) -> &'static str {
        "apt.key"
    }

    fn name(&self) -> &str {
        &self.base.name
    }

    fn state(&self) -> &DeclaredState {
        &self.base.state
    }

    fn exists(&self) -> Result<bool> {
        let eo = ExecOptions::command(
            format!("apt-key export {}", self.base.name),
            self.base.sudo,
            self.base.timeout,
        );

        // apt-key export prints nothing for an unknown key.
        let rr = exec::run(self.conn, &eo)?;
        Ok(!rr.stdout.is_empty())
    }

    fn create(&self) -> Result<()> {
        if !self.remote_key_file.is_empty() {
            self.add_from_remote_file()?;
        }

        if !self.key_server.is_empty() {
            self.add_from_key_server()?;
        }

        Ok(())
    }

    fn delete(&self) -> Result<()> {
        let eo = ExecOptions::command(
            format!("apt-key del {}", self.base.name),
            self.base.sudo,
            self.base.timeout,
        );

        let rr = exec::run(self.conn, &eo)?;
        if rr.exit_code != 0 {
            return Err(Error::RemoteCommand {
                resource: format!("apt.key {}", self.base.name),
                stderr: rr.stderr,
            });
        }

        Ok(())
    }
}

/// Download a public key over HTTP.
fn fetch_key(url: &str) -> Result<String> {
    let mut response = ureq::get(url).call().map_err(|e| Error::Transfer {
        path: url.to_string(),
        detail: e.to_string(),
        timed_out: false,
    })?;

    response
        .body_mut()
        .read_to_string()
        .map_err(|e| Error::Transfer {
            path: url.to_string(),
            detail: e.to_string(),
            timed_out: false,
        })
}
