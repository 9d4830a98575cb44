//! flint build tool.
//!
//! Scans a directory tree for `flint` description files, declares every
//! top-level call as a target, and builds all targets in parallel. Targets
//! that need another target's output wait on that file instead of on a
//! precomputed dependency graph.

mod cli;
mod config;
mod verbose;

use anyhow::{Context, Result};
use clap::Parser;
use flint_core::gate::normalize;
use flint_core::{Engine, Registry, Settings};

use cli::{Cli, Command};
use verbose::{Timer, Verbosity};

fn main() -> Result<()> {
    let cli = Cli::parse();
    verbose::init(Verbosity::from_flags(cli.quiet, cli.verbose));

    match cli.command {
        None | Some(Command::Build(_) | Command::Clean(_)) => cmd_build(&cli),
        Some(Command::List(_)) => cmd_list(&cli),
        Some(Command::Functions) => {
            cmd_functions();
            Ok(())
        }
    }
}

/// Merge the config file and the command line into engine settings.
fn load_settings(cli: &Cli) -> Result<Settings> {
    let file = config::FileConfig::load(cli.config.as_deref())?;
    let settings = config::resolve(cli, file);
    log::debug!(
        "root {}, {} workers, max wait {:?}, max build {:?}",
        settings.root.display(),
        settings.workers(),
        settings.max_wait,
        settings.max_build
    );
    Ok(settings)
}

/// Build (or clean) every target under the root.
fn cmd_build(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli)?;
    let root = settings.root.clone();
    if settings.clean {
        log::info!("Cleaning {}", root.display());
    }
    let _t = Timer::start("build");
    let build = Engine::new(settings)
        .run()
        .with_context(|| format!("build failed in {}", root.display()))?;
    for target in build.targets() {
        log::debug!("{target}: {}", target.value().unwrap_or_default());
    }
    Ok(())
}

/// Parse and declare without executing, then print one line per target.
fn cmd_list(cli: &Cli) -> Result<()> {
    let engine = Engine::new(load_settings(cli)?);
    let root = normalize(&engine.settings().root);
    let (_context, targets) = engine
        .prepare()
        .with_context(|| format!("failed to load {}", root.display()))?;
    for target in &targets {
        let file = target.file().strip_prefix(&root).unwrap_or(target.file());
        println!("{}\t{}", target.name(), file.display());
        for output in target.outputs() {
            log::debug!("  -> {}", output.display());
        }
    }
    Ok(())
}

fn cmd_functions() {
    for name in Registry::with_builtins().names() {
        println!("{name}");
    }
}
