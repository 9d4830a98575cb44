//! Command-line interface definitions for flint.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Declarative, file-gated parallel build tool.
#[derive(Parser, Debug)]
#[command(name = "flint", version, about)]
pub struct Cli {
    /// Subcommand to execute (defaults to `build`).
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Directory to scan for `flint` description files (default: `.`).
    pub root: Option<PathBuf>,

    /// Show only warnings and errors.
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Show commands, per-target detail, and timings.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Maximum number of targets running at once (0 = auto-detect from CPU count).
    #[arg(long, short = 'j', global = true)]
    pub jobs: Option<usize>,

    /// Minutes a target may wait for one file.
    #[arg(long, value_name = "MINUTES", global = true)]
    pub max_wait_time: Option<u64>,

    /// Minutes the whole build may take.
    #[arg(long, value_name = "MINUTES", global = true)]
    pub max_build_time: Option<u64>,

    /// Directory `Library` downloads into.
    #[arg(long, value_name = "DIR", global = true)]
    pub libraries: Option<PathBuf>,

    /// Set a property before any target runs.
    #[arg(
        long,
        short = 'D',
        value_name = "KEY=VALUE",
        value_parser = parse_define,
        global = true
    )]
    pub define: Vec<(String, String)>,

    /// Configuration file (default: ~/.flint/config.toml if present).
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// The project root, from the subcommand or the top level.
    pub fn root(&self) -> PathBuf {
        self.command
            .as_ref()
            .and_then(Command::root)
            .or(self.root.as_deref())
            .map_or_else(|| PathBuf::from("."), PathBuf::from)
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Build every target under the root.
    Build(ProjectArgs),
    /// Delete every declared output instead of building it.
    Clean(ProjectArgs),
    /// Parse and declare without running anything, then list the targets.
    List(ProjectArgs),
    /// List the registered build functions.
    Functions,
}

impl Command {
    fn root(&self) -> Option<&std::path::Path> {
        match self {
            Self::Build(args) | Self::Clean(args) | Self::List(args) => args.root.as_deref(),
            Self::Functions => None,
        }
    }
}

/// Arguments shared by the subcommands that work on a project.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ProjectArgs {
    /// Directory to scan for `flint` description files.
    pub root: Option<PathBuf>,
}

fn parse_define(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}
