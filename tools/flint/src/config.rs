//! User configuration: `~/.flint/config.toml` merged with command-line flags.
//!
//! ```toml
//! libraries = "/home/me/.flint/libraries"
//! max-wait-time = 3     # minutes
//! max-build-time = 10   # minutes
//! jobs = 8
//!
//! [properties]
//! mode = "release"
//! ```
//!
//! Command-line flags win over the file; the file wins over built-in defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use flint_core::Settings;
use serde::Deserialize;

use crate::cli::{Cli, Command};

/// Name of the per-user configuration directory under `$HOME`.
const CONFIG_DIR: &str = ".flint";
const CONFIG_FILE: &str = "config.toml";

/// Contents of a configuration file. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub libraries: Option<PathBuf>,
    pub max_wait_time: Option<u64>,
    pub max_build_time: Option<u64>,
    pub jobs: Option<usize>,
    pub properties: BTreeMap<String, String>,
}

impl FileConfig {
    /// Parse a configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Load the explicit file if given, else the per-user file if it exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        match default_path() {
            Some(path) if path.is_file() => {
                log::debug!("using config {}", path.display());
                Self::from_path(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}

/// `~/.flint/config.toml`, if a home directory is known.
pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Build engine settings from the file config and the command line.
pub fn resolve(cli: &Cli, file: FileConfig) -> Settings {
    let mut settings = Settings::new(cli.root());
    settings.clean = matches!(cli.command, Some(Command::Clean(_)));

    if let Some(libraries) = cli.libraries.clone().or(file.libraries) {
        settings.libraries = libraries;
    }
    if let Some(minutes) = cli.max_wait_time.or(file.max_wait_time) {
        settings.max_wait = minutes_to_duration(minutes);
    }
    if let Some(minutes) = cli.max_build_time.or(file.max_build_time) {
        settings.max_build = minutes_to_duration(minutes);
    }
    if let Some(jobs) = cli.jobs.or(file.jobs) {
        settings.jobs = jobs;
    }
    settings.properties = file.properties;
    settings.properties.extend(cli.define.iter().cloned());
    settings
}

fn minutes_to_duration(minutes: u64) -> Duration {
    Duration::from_secs(minutes.saturating_mul(60))
}
