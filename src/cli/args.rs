//! CLI argument parsing using clap.

use clap::{
    ArgAction, Parser,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

use crate::config::Settings;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Restart a command whenever files under a directory change
#[derive(Parser, Debug)]
#[command(
    name = "hotloop",
    version = env!("CARGO_PKG_VERSION"),
    about = "Restart a command whenever files under a directory change",
    long_about = "Watch a directory tree and rerun a shell command after changes settle.",
    after_help = "Examples:\n  hotloop src 'cargo run'\n  hotloop . 'make serve' ./target ./.git\n  hotloop --quiet-ms 250 web 'python -m http.server'\n\nExclusions are plain string prefixes of the full path:\n  ./build also excludes ./buildx",
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Directory tree to watch
    #[arg(value_name = "DIRECTORY")]
    pub directory: PathBuf,

    /// Command to run through the shell
    #[arg(value_name = "COMMAND")]
    pub command: String,

    /// Path prefixes whose changes are ignored
    #[arg(value_name = "EXCLUDE")]
    pub exclude: Vec<String>,

    /// Quiet period before a restart, in milliseconds
    #[arg(long, value_name = "MS")]
    pub quiet_ms: Option<u64>,

    /// Grace period between SIGINT and SIGKILL on exit, in milliseconds
    #[arg(long, value_name = "MS")]
    pub stop_timeout_ms: Option<u64>,

    /// Shell used to run the command
    #[arg(long, value_name = "PATH")]
    pub shell: Option<String>,

    /// Also watch directories created after startup
    #[arg(long)]
    pub watch_new_dirs: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Apply flags on top of loaded settings. Flags win over the environment.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(quiet_ms) = self.quiet_ms {
            settings.quiet_ms = quiet_ms;
        }
        if let Some(stop_timeout_ms) = self.stop_timeout_ms {
            settings.stop_timeout_ms = stop_timeout_ms;
        }
        if let Some(shell) = &self.shell {
            settings.shell = shell.clone();
        }
        if self.watch_new_dirs {
            settings.watch_new_dirs = true;
        }
        match self.verbose {
            0 => {}
            1 => settings.logging.default = "debug".to_string(),
            _ => settings.logging.default = "trace".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_positionals() {
        let cli = Cli::try_parse_from(["hotloop", "src", "cargo run", "src/target", "src/.git"])
            .unwrap();
        assert_eq!(cli.directory, PathBuf::from("src"));
        assert_eq!(cli.command, "cargo run");
        assert_eq!(cli.exclude, vec!["src/target", "src/.git"]);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_missing_command_is_an_error() {
        let err = Cli::try_parse_from(["hotloop", "src"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let err = Cli::try_parse_from(["hotloop"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::try_parse_from([
            "hotloop",
            "--quiet-ms",
            "200",
            "--shell",
            "/bin/bash",
            "--watch-new-dirs",
            "-vv",
            ".",
            "true",
        ])
        .unwrap();
        let mut settings = Settings::default();
        cli.apply_overrides(&mut settings);

        assert_eq!(settings.quiet_ms, 200);
        assert_eq!(settings.shell, "/bin/bash");
        assert!(settings.watch_new_dirs);
        assert_eq!(settings.logging.default, "trace");
        assert_eq!(settings.stop_timeout_ms, 5_000);
    }

    #[test]
    fn test_no_flags_keep_settings() {
        let cli = Cli::try_parse_from(["hotloop", ".", "true"]).unwrap();
        let mut settings = Settings {
            quiet_ms: 300,
            watch_new_dirs: true,
            ..Settings::default()
        };
        cli.apply_overrides(&mut settings);

        assert_eq!(settings.quiet_ms, 300);
        assert!(settings.watch_new_dirs);
        assert_eq!(settings.logging.default, "info");
    }
}
