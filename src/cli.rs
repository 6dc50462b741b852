use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "yak")]
#[command(version)]
#[command(about = "Agent-less declarative task execution", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Yak configuration file
    #[arg(long, global = true, env = "YAK_CONFIG_FILE")]
    pub config: Option<String>,

    /// Debug mode
    #[arg(short, long, global = true, env = "YAK_DEBUG")]
    pub debug: bool,

    /// Manifest directory
    #[arg(long, global = true, env = "YAK_DIR")]
    pub dir: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Debug mode, honoring the bare `DEBUG` variable when neither the
    /// flag nor `YAK_DEBUG` enabled it.
    pub fn debug_enabled(&self) -> bool {
        self.debug_with(std::env::var("DEBUG").ok())
    }

    fn debug_with(&self, fallback: Option<String>) -> bool {
        self.debug
            || fallback.is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
    }

    /// Manifest directory: the flag, then `YAK_DIR`, then `DIR`, then
    /// the current directory.
    pub fn manifest_dir(&self) -> String {
        self.dir_with(std::env::var("DIR").ok())
    }

    fn dir_with(&self, fallback: Option<String>) -> String {
        self.dir
            .clone()
            .or(fallback)
            .unwrap_or_else(|| ".".to_string())
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a task
    Run {
        /// Task name, without the task:: prefix
        task: String,
    },

    /// Show which hosts each step of a task would run on
    Plan {
        /// Task name, without the task:: prefix
        task: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_takes_a_task_name() {
        let cli = Cli::parse_from(["yak", "run", "memcached"]);
        assert!(matches!(cli.command, Command::Run { ref task } if task == "memcached"));
        assert_eq!(cli.dir_with(None), ".");
    }

    #[test]
    fn global_flags_apply_to_subcommands() {
        let cli = Cli::parse_from(["yak", "plan", "memcached", "--dir", "/srv/yak", "-d"]);
        assert!(cli.debug);
        assert_eq!(cli.dir_with(None), "/srv/yak");
    }

    #[test]
    fn bare_env_vars_are_fallbacks() {
        let cli = Cli::parse_from(["yak", "run", "memcached"]);
        assert!(cli.debug_with(Some("true".to_string())));
        assert!(cli.debug_with(Some("1".to_string())));
        assert!(!cli.debug_with(Some("0".to_string())));
        assert!(!cli.debug_with(None));
        assert_eq!(cli.dir_with(Some("/srv/yak".to_string())), "/srv/yak");

        let cli = Cli::parse_from(["yak", "run", "memcached", "-d", "--dir", "/etc/yak"]);
        assert!(cli.debug_with(None));
        assert_eq!(cli.dir_with(Some("/srv/yak".to_string())), "/etc/yak");
    }
}
