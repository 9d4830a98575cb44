//! Console logging for the flint binary.
//!
//! Three output levels controlled by CLI flags:
//! - **Quiet** (`-q`): warnings and errors only
//! - **Default** (no flag): phase progress and command output
//! - **Verbose** (`-v`): commands, per-target detail, and timings
//!
//! `FLINT_LOG` takes an `env_logger` filter and overrides all of the above.
//! Log output goes to stderr; stdout is reserved for command results such as
//! `flint list`.

use std::io::Write;
use std::time::Instant;

use env_logger::{Builder, Env, Target};
use log::{Level, LevelFilter};

/// Environment variable holding an `env_logger` filter.
pub const LOG_ENV: &str = "FLINT_LOG";

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    Default,
    Verbose,
}

impl Verbosity {
    /// Pick the level from the `--quiet` / `--verbose` flags.
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Default
        }
    }

    pub fn level(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::Warn,
            Self::Default => LevelFilter::Info,
            Self::Verbose => LevelFilter::Debug,
        }
    }
}

/// Install the global logger. Info lines print bare; warnings and errors get
/// a prefix.
pub fn init(verbosity: Verbosity) {
    let mut builder = Builder::new();
    builder
        .filter_level(verbosity.level())
        .target(Target::Stderr)
        .format(|buf, record| match record.level() {
            Level::Info => writeln!(buf, "{}", record.args()),
            Level::Warn => writeln!(buf, "warning: {}", record.args()),
            Level::Error => writeln!(buf, "error: {}", record.args()),
            Level::Debug | Level::Trace => writeln!(buf, "  {}", record.args()),
        });
    builder.parse_env(Env::new().filter(LOG_ENV));
    // A logger may already be installed when running under a test harness.
    let _ = builder.try_init();
}

/// RAII timer that logs elapsed duration on drop at debug level.
///
/// ```ignore
/// let _t = Timer::start("declare");
/// // ... work ...
/// // logs "  declare: 42ms" on drop
/// ```
pub struct Timer {
    label: &'static str,
    start: Instant,
}

impl Timer {
    /// Begin timing a labeled operation.
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        log::debug!("{}: {:.1?}", self.label, self.start.elapsed());
    }
}
