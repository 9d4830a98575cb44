//! Error taxonomy for the build engine.
//!
//! Every variant is fatal: nothing is recovered locally, and the first error
//! raised anywhere in a run aborts the whole build.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::syntax::{Category, Location};

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A fatal build error.
#[derive(Debug, Error)]
pub enum Error {
    /// A character run that matches no lexical rule.
    #[error("{location} couldn't parse {text:?}")]
    Lex {
        /// Where the run starts.
        location: Location,
        /// The unmatched text.
        text: String,
    },

    /// The parser found a token of the wrong category.
    #[error("{location} expected {expected}, found {found} ({value:?})")]
    Syntax {
        /// Where the offending token starts.
        location: Location,
        /// The category the grammar required.
        expected: Category,
        /// The category actually found.
        found: Category,
        /// The offending token's text.
        value: String,
    },

    /// The same parameter name appears twice in one call.
    #[error("{location} duplicate parameter `{key}`")]
    DuplicateParameter {
        /// The call's location.
        location: Location,
        /// The repeated parameter name.
        key: String,
    },

    /// No function is registered under this name.
    #[error("{location} couldn't load function \"{name}\"")]
    UnknownFunction {
        /// Where the name appears.
        location: Location,
        /// The name that was looked up.
        name: String,
    },

    /// A function asked for a parameter that was not given.
    #[error("{function} missing parameter `{key}`")]
    MissingParameter {
        /// Function name and location, e.g. `Exec at flint:3`.
        function: String,
        /// The missing parameter.
        key: String,
    },

    /// A parameter was given but has the wrong shape, or is not recognised.
    #[error("{function}: parameter `{key}` {reason}")]
    InvalidParameter {
        /// Function name and location.
        function: String,
        /// The offending parameter.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A read of a property no target ever set.
    #[error("no targets set property {key}")]
    MissingProperty {
        /// The property that was read.
        key: String,
    },

    /// `open` on a path that was never registered.
    #[error("{} was provided before it was added", .path.display())]
    GateNotRegistered {
        /// The path that was opened.
        path: PathBuf,
    },

    /// `await` on a path that nothing will ever produce.
    #[error("no targets provide {}", .path.display())]
    NoProducer {
        /// The path that was awaited.
        path: PathBuf,
    },

    /// Two targets declared the same output.
    #[error("{} is already produced by another target", .path.display())]
    GateAlreadyPending {
        /// The contested output.
        path: PathBuf,
    },

    /// A file that should exist on disk does not.
    #[error("file {} does not exist", .path.display())]
    MissingFile {
        /// The expected file.
        path: PathBuf,
    },

    /// A target tried to provide a directory instead of a file.
    #[error("{} is a directory, not a file", .path.display())]
    NotAFile {
        /// The directory that was provided.
        path: PathBuf,
    },

    /// A gate stayed pending for longer than the per-file bound.
    #[error("{} took too long (> {bound:?})", .path.display())]
    AwaitTimeout {
        /// The file that never opened.
        path: PathBuf,
        /// The per-file bound that elapsed.
        bound: Duration,
    },

    /// The whole build ran longer than the global bound.
    #[error("build took too long (> {bound:?}), unfinished: {}", .stragglers.join(", "))]
    BuildTimeout {
        /// The global bound that elapsed.
        bound: Duration,
        /// Names of the targets still unfinished.
        stragglers: Vec<String>,
    },

    /// An external command exited with a non-zero status.
    #[error("command exited with status {status}: {command}\n{stderr}")]
    CommandFailed {
        /// The shell script that ran.
        command: String,
        /// Exit status, or `-1` when killed by a signal.
        status: i32,
        /// Everything the command wrote to stderr.
        stderr: String,
    },

    /// An external command could not be started at all.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        /// The shell script that was to run.
        command: String,
        /// Why the process could not start.
        #[source]
        source: std::io::Error,
    },

    /// A target failed during its declare phase.
    #[error("{target} failed to declare: {source}")]
    Declare {
        /// Name of the failing target.
        target: String,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// `Platform` has no branch for the running operating system.
    #[error("unrecognized platform {os}")]
    UnsupportedPlatform {
        /// `std::env::consts::OS` of the running host.
        os: String,
    },

    /// A `Find` pattern is not a valid regular expression.
    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        /// The pattern as written.
        pattern: String,
        /// The regex compile error.
        #[source]
        source: regex::Error,
    },

    /// A filesystem operation failed.
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        /// What was being attempted, e.g. `read` or `create`.
        action: &'static str,
        /// The path it was attempted on.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The build was aborted by another target's failure or by the global timeout.
    #[error("build cancelled")]
    Cancelled,
}

impl Error {
    /// Wraps an I/O error with the action and path that produced it.
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this error only reports that the build was cancelled.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Declare { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}
