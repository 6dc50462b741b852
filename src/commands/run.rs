//! `yak run <task>`

use anyhow::{bail, Result};

use crate::commands::load_herd;
use crate::runner;

pub fn run(dir: &str, task: &str) -> Result<()> {
    let herd = load_herd(dir)?;
    let summary = runner::run_task(&herd, task)?;

    log::info!(
        "{} host execution(s): {} changed, {} failed",
        summary.hosts,
        summary.changed,
        summary.failed
    );

    if summary.failed > 0 {
        bail!("{} host execution(s) failed", summary.failed);
    }

    Ok(())
}
