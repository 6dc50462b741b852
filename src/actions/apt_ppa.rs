//! The `apt.ppa` action: Launchpad PPA repositories

use std::sync::OnceLock;

use reconcile::{DeclaredState, Reconcile};

use crate::actions::exec::{self, ExecOptions};
use crate::actions::lsb;
use crate::actions::{run_reconciler, Base};
use crate::connections::Connection;
use crate::error::{Error, Result};
use crate::options::{InputMap, Schema};

pub fn converge_step(conn: &dyn Connection, input: &InputMap) -> Result<bool> {
    let mut schema = Schema::new("apt.ppa", input);
    let base = Base::decode(&mut schema);
    let refresh = schema.bool("refresh", true);
    schema.finish()?;

    run_reconciler(&AptPpa {
        conn,
        base,
        refresh,
        file: OnceLock::new(),
    })
}

struct AptPpa<'a> {
    conn: &'a dyn Connection,
    base: Base,
    refresh: bool,
    file: OnceLock<String>,
}

impl AptPpa<'_> {
    /// The sources.list.d file apt-add-repository writes for this PPA.
    /// Needs the distribution id and codename, so it costs one
    /// lsb_release round-trip the first time.
    fn source_file(&self) -> Result<String> {
        if let Some(file) = self.file.get() {
            return Ok(file.clone());
        }

        let info = lsb::lsb_info(self.conn, self.base.sudo, self.base.timeout)?;
        let distro = format!("-{}-", info.distributor_id.to_lowercase());

        let name = self
            .base
            .name
            .replace('/', &distro)
            .replace(':', "-")
            .replace('.', "_");

        let file = format!(
            "/etc/apt/sources.list.d/{name}-{}.list",
            info.codename.to_lowercase()
        );
        log::debug!("ppa file: {file}");

        let _ = self.file.set(file.clone());
        Ok(file)
    }

    fn run_checked(&self, cmd: String) -> Result<()> {
        let eo = ExecOptions::command(cmd, self.base.sudo, self.base.timeout);
        let rr = exec::run(self.conn, &eo)?;
        if rr.exit_code != 0 {
            return Err(Error::RemoteCommand {
                resource: format!("apt.ppa {}", self.base.name),
                stderr: rr.stderr,
            });
        }
        Ok(())
    }

    fn update_index(&self) -> Result<()> {
        self.run_checked("apt-get update -qq".to_string())
    }
}

impl Reconcile for AptPpa<'_> {
    type Error = Error;

    fn kind(&self) -> &'static str {
        "apt.ppa"
    }

    fn name(&self) -> &str {
        &self.base.name
    }

    fn state(&self) -> &DeclaredState {
        &self.base.state
    }

    fn exists(&self) -> Result<bool> {
        let file = self.source_file()?;
        let eo = ExecOptions::command(
            format!(r#"stat "{file}""#),
            self.base.sudo,
            self.base.timeout,
        );

        let rr = exec::run(self.conn, &eo)?;
        Ok(rr.exit_code == 0)
    }

    fn create(&self) -> Result<()> {
        self.run_checked(format!("apt-add-repository -y ppa:{}", self.base.name))?;

        if self.refresh {
            self.update_index()?;
        }

        Ok(())
    }

    fn delete(&self) -> Result<()> {
        let file = self.source_file()?;

        self.run_checked(format!("apt-add-repository -y -r ppa:{}", self.base.name))?;
        self.run_checked(format!("rm {file}"))?;

        if self.refresh {
            self.update_index()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::testing::Scripted;
    use serde_yaml::Value;

    const LSB: &str = "Distributor ID:\tUbuntu\n\
        Description:\tUbuntu 22.04 LTS\n\
        Release:\t22.04\n\
        Codename:\tjammy\n";

    fn input(name: &str, state: &str) -> InputMap {
        let mut m = InputMap::new();
        m.insert("name".to_string(), Value::String(name.to_string()));
        if !state.is_empty() {
            m.insert("state".to_string(), Value::String(state.to_string()));
        }
        m.insert("sudo".to_string(), Value::Bool(true));
        m
    }

    #[test]
    fn source_file_name_derives_from_lsb() {
        let conn = Scripted::new();
        conn.respond(0, LSB, "");
        conn.respond(1, "", "stat: cannot statx");
        conn.respond(0, "", "");
        conn.respond(0, "", "");

        let changed = converge_step(&conn, &input("ondrej/php", "present")).unwrap();
        assert!(changed);

        let cmds = conn.commands();
        assert_eq!(cmds[0], "sudo /usr/bin/lsb_release -a");
        assert_eq!(
            cmds[1],
            r#"sudo stat "/etc/apt/sources.list.d/ondrej-ubuntu-php-jammy.list""#
        );
        assert_eq!(cmds[2], "sudo apt-add-repository -y ppa:ondrej/php");
        assert_eq!(cmds[3], "sudo apt-get update -qq");
    }

    #[test]
    fn existing_ppa_is_unchanged() {
        let conn = Scripted::new();
        conn.respond(0, LSB, "");
        conn.respond(0, "  File: /etc/apt/sources.list.d/...", "");

        let changed = converge_step(&conn, &input("ondrej/php", "present")).unwrap();
        assert!(!changed);
        assert_eq!(conn.commands().len(), 2);
    }

    #[test]
    fn absent_ppa_removes_repository_and_file() {
        let conn = Scripted::new();
        conn.respond(0, LSB, "");
        conn.respond(0, "  File: ...", "");
        conn.respond(0, "", "");
        conn.respond(0, "", "");
        conn.respond(0, "", "");

        let changed = converge_step(&conn, &input("ondrej/php", "absent")).unwrap();
        assert!(changed);

        let cmds = conn.commands();
        assert_eq!(cmds[2], "sudo apt-add-repository -y -r ppa:ondrej/php");
        assert_eq!(
            cmds[3],
            "sudo rm /etc/apt/sources.list.d/ondrej-ubuntu-php-jammy.list"
        );
        assert_eq!(cmds[4], "sudo apt-get update -qq");
    }

    #[test]
    fn refresh_false_skips_the_index_update() {
        let conn = Scripted::new();
        conn.respond(0, LSB, "");
        conn.respond(1, "", "");
        conn.respond(0, "", "");

        let mut i = input("ondrej/php", "present");
        i.insert("refresh".to_string(), Value::Bool(false));

        let changed = converge_step(&conn, &i).unwrap();
        assert!(changed);
        assert_eq!(conn.commands().len(), 3);
    }
}
