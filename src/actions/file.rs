//! File transfer and deletion actions

use crate::actions::exec::{self, ExecOptions};
use crate::connections::{Connection, CopyOptions, FileOptions, FileResult};
use crate::error::{Error, Result};
use crate::options::{InputMap, Schema};

fn copy_options(action: &'static str, input: &InputMap) -> Result<CopyOptions> {
    let mut schema = Schema::new(action, input);
    let opts = CopyOptions {
        source: schema.required("source"),
        destination: schema.required("destination"),
        uid: schema.opt_u32("uid"),
        gid: schema.opt_u32("gid"),
        mode: schema.opt_u32("mode"),
        timeout: schema.u64("timeout", 0),
    };
    schema.finish()?;
    Ok(opts)
}

/// The `upload-file` action.
pub fn upload(conn: &dyn Connection, input: &InputMap) -> Result<FileResult> {
    let opts = copy_options("upload-file", input)?;
    log::info!("uploading {} to {}", opts.source, opts.destination);
    conn.file_upload(opts)
}

/// The `download-file` action.
pub fn download(conn: &dyn Connection, input: &InputMap) -> Result<FileResult> {
    let opts = copy_options("download-file", input)?;
    log::info!("downloading {} to {}", opts.source, opts.destination);
    conn.file_download(opts)
}

/// The `delete-file` action.
pub fn delete(conn: &dyn Connection, input: &InputMap) -> Result<FileResult> {
    let mut schema = Schema::new("delete-file", input);
    let opts = FileOptions {
        path: schema.required("path"),
        timeout: schema.u64("timeout", 0),
    };
    schema.finish()?;

    log::info!("deleting {}", opts.path);
    conn.file_delete(opts)
}

/// Upload a file and then `mv` it into its final destination through the
/// command channel. Lets a sudo-only path be written by staging in a
/// world-writable location first.
pub(crate) fn upload_and_move(
    conn: &dyn Connection,
    copy: CopyOptions,
    mut eo: ExecOptions,
    final_destination: &str,
) -> Result<FileResult> {
    let staged = copy.destination.clone();
    let fr = conn.file_upload(copy)?;

    if !fr.success {
        return Err(Error::Transfer {
            path: staged,
            detail: "upload failed".to_string(),
            timed_out: fr.timed_out,
        });
    }

    eo.cmd = format!(r#"mv "{staged}" "{final_destination}""#);
    let rr = exec::run(conn, &eo)?;
    if rr.exit_code != 0 {
        return Err(Error::driver(final_destination, rr.stderr));
    }

    Ok(fr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::testing::Scripted;
    use serde_yaml::Value;

    fn input(pairs: &[(&str, &str)]) -> InputMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::String((*v).to_string())))
            .collect()
    }

    #[test]
    fn upload_requires_source_and_destination() {
        let conn = Scripted::new();
        let err = upload(&conn, &InputMap::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingInput { action: "upload-file", ref fields }
                if fields == &["source", "destination"]
        ));
    }

    #[test]
    fn delete_requires_path() {
        let conn = Scripted::new();
        assert!(delete(&conn, &InputMap::new()).is_err());

        let i = input(&[("path", "/tmp/stale")]);
        assert!(delete(&conn, &i).unwrap().applied);
        assert_eq!(conn.deletes(), vec!["/tmp/stale"]);
    }

    #[test]
    fn upload_and_move_issues_the_rename() {
        let conn = Scripted::new();
        conn.respond(0, "", "");

        let staged = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(staged.path(), "deb http://x y z").unwrap();

        let copy = CopyOptions {
            source: staged.path().display().to_string(),
            destination: "/tmp/staged".to_string(),
            ..CopyOptions::default()
        };
        let eo = ExecOptions::command(String::new(), true, 0);

        upload_and_move(&conn, copy, eo, "/etc/apt/sources.list.d/x.list").unwrap();
        assert_eq!(
            conn.commands(),
            vec![r#"sudo mv "/tmp/staged" "/etc/apt/sources.list.d/x.list""#]
        );
    }
}
