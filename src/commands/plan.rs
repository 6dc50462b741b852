//! `yak plan <task>`: which hosts each step would touch, without
//! connecting to any of them

use anyhow::Result;
use colored::Colorize;

use crate::commands::load_herd;

pub fn run(dir: &str, task: &str) -> Result<()> {
    let herd = load_herd(dir)?;
    let steps = herd.steps_for_task(task)?;

    println!("{}", format!("yak plan - {task}").yellow().underline());
    println!();

    for step in steps {
        println!("{}", step.name.cyan());

        let hosts = herd.hosts_for_step(step)?;
        for host in &hosts {
            println!(
                "{}",
                format!(
                    "  - host={} target=\"{}\" connection=\"{}\"",
                    host.name, host.target_name, host.connection_name
                )
                .magenta()
            );
        }

        if let Some(notify) = &step.notify {
            println!("{}", format!("  - notify: {notify}").blue());
        }
    }

    Ok(())
}
