//! Engine configuration.

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// Per-file await bound used when nothing else is configured.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(3 * 60);

/// Whole-build bound used when nothing else is configured.
pub const DEFAULT_MAX_BUILD: Duration = Duration::from_secs(5 * 60);

/// Everything the engine needs to know besides the description files.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory scanned for description files.
    pub root: PathBuf,
    /// Directory `Library` downloads into.
    pub libraries: PathBuf,
    /// Run in clean mode: functions delete their outputs instead of building them.
    pub clean: bool,
    /// How long one target may wait for one file.
    pub max_wait: Duration,
    /// How long the whole execute phase may take.
    pub max_build: Duration,
    /// Maximum number of runnable targets (0 = available parallelism).
    pub jobs: usize,
    /// Properties visible before any target declares.
    pub properties: BTreeMap<String, String>,
}

impl Settings {
    /// Default settings for a build rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            libraries: env::temp_dir(),
            clean: false,
            max_wait: DEFAULT_MAX_WAIT,
            max_build: DEFAULT_MAX_BUILD,
            jobs: 0,
            properties: BTreeMap::new(),
        }
    }

    /// Number of runnable slots the throttle hands out.
    pub fn workers(&self) -> usize {
        match self.jobs {
            0 => thread::available_parallelism().map_or(4, |n| n.get()),
            n => n,
        }
    }
}
