//! Step actions
//!
//! Core actions (`exec` and the file transfers) map straight onto the
//! connection. Compound actions (`apt.*`, `cron.entry`) implement the
//! [`reconcile::Reconcile`] contract and run through
//! [`reconcile::converge`], so all of them share one decision order and
//! one definition of "changed".

pub mod apt_key;
pub mod apt_pkg;
pub mod apt_ppa;
pub mod apt_source;
pub mod cron_entry;
pub mod exec;
pub mod file;
mod lsb;

use reconcile::DeclaredState;

use crate::connections::Connection;
use crate::error::{Error, Result};
use crate::manifest::Step;
use crate::options::Schema;

/// Fields common to every compound action.
#[derive(Debug, Clone)]
pub(crate) struct Base {
    pub name: String,
    pub state: DeclaredState,
    pub sudo: bool,
    pub timeout: u64,
}

impl Base {
    /// Decode the shared fields, leaving action-specific keys to the
    /// caller's schema.
    fn decode(schema: &mut Schema<'_>) -> Self {
        Self {
            name: schema.required("name"),
            state: DeclaredState::parse(&schema.string("state", "present")),
            sudo: schema.bool("sudo", false),
            timeout: schema.u64("timeout", 0),
        }
    }
}

/// Converge one compound resource and report whether it changed.
pub(crate) fn run_reconciler<R>(resource: &R) -> Result<bool>
where
    R: reconcile::Reconcile<Error = Error>,
{
    let outcome = reconcile::converge(resource)?;
    let verb = match outcome {
        reconcile::Outcome::Created => "created",
        reconcile::Outcome::Refreshed => "refreshed",
        reconcile::Outcome::Removed => "removed",
        reconcile::Outcome::Unchanged => "unchanged",
    };
    log::info!(
        "{} {} ({}): {verb}",
        resource.kind(),
        resource.name(),
        resource.state()
    );
    Ok(outcome.changed())
}

/// Run a single step against one host's connection.
///
/// Returns whether remote state changed; that flag gates notify
/// execution. The action set is closed: adding an action means adding
/// a module and a match arm here.
pub fn dispatch(conn: &dyn Connection, step: &Step) -> Result<bool> {
    match step.action.as_str() {
        "exec" => {
            let rr = exec::exec_step(conn, &step.input)?;
            if rr.exit_code != 0 {
                return Err(Error::RemoteCommand {
                    resource: step.name.clone(),
                    stderr: rr.stderr,
                });
            }
            Ok(rr.applied)
        }

        "delete-file" => Ok(file::delete(conn, &step.input)?.applied),
        "download-file" => Ok(file::download(conn, &step.input)?.applied),
        "upload-file" => Ok(file::upload(conn, &step.input)?.applied),

        "apt.key" => apt_key::converge_step(conn, &step.input),
        "apt.ppa" => apt_ppa::converge_step(conn, &step.input),
        "apt.pkg" => apt_pkg::converge_step(conn, &step.input),
        "apt.source" => apt_source::converge_step(conn, &step.input),
        "cron.entry" => cron_entry::converge_step(conn, &step.input),

        other => Err(Error::UnsupportedAction(other.to_string())),
    }
}
