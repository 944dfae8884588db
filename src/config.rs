//! Runtime settings.
//!
//! Layered with figment:
//! - Built-in defaults
//! - Environment variable overrides
//! - CLI flag overrides (applied by the binary)
//!
//! There is no configuration file.
//!
//! # Environment Variables
//!
//! Variables are prefixed with `HOTLOOP_`. A double underscore separates
//! nested levels; single underscores stay part of the field name:
//! - `HOTLOOP_QUIET_MS=250` sets `quiet_ms`
//! - `HOTLOOP_LOGGING__DEFAULT=debug` sets `logging.default`

use std::collections::HashMap;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};

use crate::watcher::QUIET_MS;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Quiet period before a restart, in milliseconds
    #[serde(default = "default_quiet_ms")]
    pub quiet_ms: u64,

    /// How long a stopping child gets after SIGINT before SIGKILL
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    /// Shell used to run the command (`<shell> -c <command>`)
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Watch directories created after startup
    #[serde(default)]
    pub watch_new_dirs: bool,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for every target
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `hotloop::watcher = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_quiet_ms() -> u64 {
    QUIET_MS
}
fn default_stop_timeout_ms() -> u64 {
    5_000
}
fn default_shell() -> String {
    "/bin/sh".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quiet_ms: default_quiet_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
            shell: default_shell(),
            watch_new_dirs: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Defaults merged with `HOTLOOP_` environment variables.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Env::prefixed("HOTLOOP_").map(|key| {
                key.as_str()
                    .to_lowercase()
                    .replace("__", ".") // Double underscore becomes dot
                    .into()
            }))
    }

    /// Load settings from all sources.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment().extract().map_err(Box::new)
    }

    pub fn quiet(&self) -> Duration {
        Duration::from_millis(self.quiet_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.quiet_ms, 1000);
        assert_eq!(settings.quiet(), Duration::from_secs(1));
        assert_eq!(settings.stop_timeout(), Duration::from_secs(5));
        assert_eq!(settings.shell, "/bin/sh");
        assert!(!settings.watch_new_dirs);
        assert_eq!(settings.logging.default, "info");
    }

    #[test]
    fn test_load_without_env_is_default() {
        Jail::expect_with(|_jail| {
            let settings: Settings = Settings::figment().extract()?;
            assert_eq!(settings, Settings::default());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides() {
        Jail::expect_with(|jail| {
            jail.set_env("HOTLOOP_QUIET_MS", "250");
            jail.set_env("HOTLOOP_SHELL", "/bin/bash");
            jail.set_env("HOTLOOP_WATCH_NEW_DIRS", "true");
            jail.set_env("HOTLOOP_LOGGING__DEFAULT", "debug");

            let settings: Settings = Settings::figment().extract()?;
            assert_eq!(settings.quiet_ms, 250);
            assert_eq!(settings.shell, "/bin/bash");
            assert!(settings.watch_new_dirs);
            assert_eq!(settings.logging.default, "debug");
            // Untouched fields keep their defaults
            assert_eq!(settings.stop_timeout_ms, 5_000);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_env_value_is_an_error() {
        Jail::expect_with(|jail| {
            jail.set_env("HOTLOOP_QUIET_MS", "soon");
            assert!(Settings::figment().extract::<Settings>().is_err());
            Ok(())
        });
    }
}
