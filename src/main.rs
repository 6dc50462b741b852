mod actions;
mod cli;
mod commands;
mod config;
mod connections;
mod error;
mod manifest;
mod options;
mod runner;
mod targets;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    if let Some(path) = &cli.config {
        let expanded = shellexpand::tilde(path);
        config::set_config_file(expanded.as_ref());
    }

    let dir = cli.manifest_dir();
    match cli.command {
        Command::Run { task } => commands::run::run(&dir, &task),
        Command::Plan { task } => commands::plan::run(&dir, &task),
    }
}
