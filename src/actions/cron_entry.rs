//! The `cron.entry` action: single entries in a user's crontab
//!
//! Entries are tagged with a trailing `# <name>` comment so a renamed
//! schedule replaces its old line instead of accumulating duplicates.

use std::io::Write;

use reconcile::{DeclaredState, Reconcile};

use crate::actions::exec::{self, ExecOptions};
use crate::actions::{run_reconciler, Base};
use crate::connections::{Connection, CopyOptions, FileOptions};
use crate::error::{Error, Result};
use crate::options::{InputMap, Schema};

pub fn converge_step(conn: &dyn Connection, input: &InputMap) -> Result<bool> {
    let mut schema = Schema::new("cron.entry", input);
    let base = Base::decode(&mut schema);
    let entry = CronEntry {
        conn,
        user: schema.string("user", "root"),
        command: schema.required("command"),
        minute: schema.string("minute", "*"),
        hour: schema.string("hour", "*"),
        day_of_month: schema.string("day_of_month", "*"),
        month: schema.string("month", "*"),
        day_of_week: schema.string("day_of_week", "*"),
        base,
    };
    schema.finish()?;

    run_reconciler(&entry)
}

struct CronEntry<'a> {
    conn: &'a dyn Connection,
    base: Base,
    user: String,
    command: String,
    minute: String,
    hour: String,
    day_of_month: String,
    month: String,
    day_of_week: String,
}

impl CronEntry<'_> {
    /// The fully formatted crontab line, tag included.
    fn entry(&self) -> String {
        format!(
            "{} {} {} {} {} {} # {}",
            self.minute,
            self.hour,
            self.day_of_month,
            self.month,
            self.day_of_week,
            self.command,
            self.base.name
        )
    }

    /// The user's current crontab lines, or `None` when no crontab is
    /// installed (crontab -l exits non-zero).
    fn entries(&self) -> Result<Option<Vec<String>>> {
        let eo = ExecOptions::command(
            format!("crontab -u {} -l", self.user),
            self.base.sudo,
            self.base.timeout,
        );

        let rr = exec::run(self.conn, &eo)?;
        if rr.exit_code != 0 {
            return Ok(None);
        }

        Ok(Some(rr.stdout.lines().map(ToString::to_string).collect()))
    }

    /// Stage the new crontab on the host and load it.
    fn push(&self, entries: &[String]) -> Result<()> {
        let mut staged = tempfile::NamedTempFile::new()
            .map_err(|e| Error::driver("cron.entry", e))?;
        let mut content = entries.join("\n");
        content.push('\n');
        staged
            .write_all(content.as_bytes())
            .map_err(|e| Error::driver("cron.entry", e))?;

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
                detail: "unable to stage crontab on host".to_string(),
                timed_out: fr.timed_out,
            });
        }

        let eo = ExecOptions::command(
            format!("crontab -u {} {path}", self.user),
            self.base.sudo,
            self.base.timeout,
        );
        let rr = exec::run(self.conn, &eo)?;
        if rr.exit_code != 0 {
            return Err(Error::RemoteCommand {
                resource: format!("cron.entry {}", self.base.name),
                stderr: rr.stderr,
            });
        }

        self.conn.file_delete(FileOptions {
            path,
            timeout: self.base.timeout,
        })?;

        Ok(())
    }
}

impl Reconcile for CronEntry<'_> {
    type Error = Error;

    fn kind(&self) -> &'static str {
        "cron.entry"
    }

    fn name(&self) -> &str {
        &self.base.name
    }

    fn state(&self) -> &DeclaredState {
        &self.base.state
    }

    fn exists(&self) -> Result<bool> {
        let entry = self.entry();
        match self.entries()? {
            Some(lines) => Ok(lines.iter().any(|line| *line == entry)),
            None => Ok(false),
        }
    }

    fn create(&self) -> Result<()> {
        let tag = format!("# {}", self.base.name);
        let mut lines = self.entries()?.unwrap_or_default();

        let mut replaced = false;
        for line in &mut lines {
            if line.contains(&tag) {
                *line = self.entry();
                replaced = true;
            }
        }

        if !replaced {
            lines.push(self.entry());
        }

        self.push(&lines)
    }

    fn delete(&self) -> Result<()> {
        let entry = self.entry();
        let lines = self
            .entries()?
            .ok_or_else(|| {
                Error::driver(
                    "cron.entry",
                    format!("{}: no crontab for user {}", self.base.name, self.user),
                )
            })?
            .into_iter()
            .filter(|line| *line != entry)
            .collect::<Vec<_>>();

        self.push(&lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::testing::Scripted;
    use serde_yaml::Value;

    fn input(pairs: &[(&str, Value)]) -> InputMap {
        let mut m = InputMap::new();
        m.insert("name".to_string(), Value::String("backup".into()));
        m.insert(
            "command".to_string(),
            Value::String("/bin/backup.sh".into()),
        );
        for (k, v) in pairs {
            m.insert((*k).to_string(), v.clone());
        }
        m
    }

    #[test]
    fn name_and_command_are_required() {
        let conn = Scripted::new();
        let err = converge_step(&conn, &InputMap::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingInput { action: "cron.entry", ref fields }
                if fields == &["name", "command"]
        ));
    }

    #[test]
    fn entry_formats_schedule_command_and_tag() {
        let conn = Scripted::new();
        conn.respond(1, "", "no crontab for root");
        conn.respond(1, "", "no crontab for root");
        conn.respond(0, "", "");

        let changed = converge_step(
            &conn,
            &input(&[
                ("minute", Value::Number(0.into())),
                ("hour", Value::Number(2.into())),
            ]),
        )
        .unwrap();
        assert!(changed);

        let uploads = conn.uploads();
        assert_eq!(uploads[0].1, "0 2 * * * /bin/backup.sh # backup\n");

        let cmds = conn.commands();
        assert_eq!(cmds[0], "crontab -u root -l");
        assert!(cmds[2].starts_with("crontab -u root "));
        assert_eq!(conn.deletes().len(), 1);
    }

    #[test]
    fn matching_entry_is_unchanged() {
        let conn = Scripted::new();
        conn.respond(0, "* * * * * /bin/backup.sh # backup\n", "");

        let changed = converge_step(&conn, &input(&[])).unwrap();
        assert!(!changed);
        assert_eq!(conn.commands().len(), 1);
    }

    #[test]
    fn changed_schedule_replaces_the_tagged_line() {
        let existing = "0 4 * * * /bin/backup.sh # backup\n30 * * * * /bin/other.sh # other\n";
        let conn = Scripted::new();
        conn.respond(0, existing, "");
        conn.respond(0, existing, "");
        conn.respond(0, "", "");

        let changed = converge_step(
            &conn,
            &input(&[
                ("minute", Value::Number(0.into())),
                ("hour", Value::Number(2.into())),
            ]),
        )
        .unwrap();
        assert!(changed);

        let uploads = conn.uploads();
        assert_eq!(
            uploads[0].1,
            "0 2 * * * /bin/backup.sh # backup\n30 * * * * /bin/other.sh # other\n"
        );
    }

    #[test]
    fn absent_entry_is_filtered_out() {
        let existing = "* * * * * /bin/backup.sh # backup\n30 * * * * /bin/other.sh # other\n";
        let conn = Scripted::new();
        conn.respond(0, existing, "");
        conn.respond(0, existing, "");
        conn.respond(0, "", "");

        let changed =
            converge_step(&conn, &input(&[("state", Value::String("absent".into()))])).unwrap();
        assert!(changed);

        let uploads = conn.uploads();
        assert_eq!(uploads[0].1, "30 * * * * /bin/other.sh # other\n");
    }

    #[test]
    fn custom_user_is_threaded_through() {
        let conn = Scripted::new();
        conn.respond(1, "", "");
        conn.respond(1, "", "");
        conn.respond(0, "", "");

        let changed = converge_step(
            &conn,
            &input(&[
                ("user", Value::String("deploy".into())),
                ("sudo", Value::Bool(true)),
            ]),
        )
        .unwrap();
        assert!(changed);
        assert_eq!(conn.commands()[0], "sudo crontab -u deploy -l");
    }
}
