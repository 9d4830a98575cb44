//! The build engine: scan, parse, declare, execute.
//!
//! There is no dependency graph. Every target is started as soon as the
//! throttle has a free slot, and targets that need another target's output
//! simply block on that file's gate. The main thread only collects outcomes
//! and enforces the global deadline.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use walkdir::{DirEntry, WalkDir};

use crate::context::{Acquire, Context};
use crate::error::{Error, Result};
use crate::function::Registry;
use crate::gate::normalize;
use crate::settings::Settings;
use crate::syntax::parser::parse_file;
use crate::target::Target;

/// File name of build descriptions.
pub const DESCRIPTION_FILE: &str = "flint";

/// Directories with this name hold build outputs and are not scanned.
pub const OUTPUT_DIR: &str = "out";

/// Files found under the root.
#[derive(Debug, Clone, Default)]
pub struct Scan {
    /// Every file, absolute, in walk order.
    pub files: Vec<PathBuf>,
    /// The description files among them.
    pub descriptions: Vec<PathBuf>,
}

/// A finished, successful run.
#[derive(Debug)]
pub struct Build {
    context: Context,
    targets: Vec<Target>,
    elapsed: Duration,
}

impl Build {
    /// The shared state the run ended with.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Every target, in discovery order.
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Look a target up by its declared name.
    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name() == name)
    }

    /// Wall-clock time from scan to the last target.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Result sent back from a worker thread.
enum TargetOutcome {
    Built { index: usize, elapsed: Duration },
    Failed { index: usize, error: Error },
    /// Never started because the run was cancelled first.
    Skipped { index: usize },
}

/// Runs every target found under the configured root.
#[derive(Debug)]
pub struct Engine {
    settings: Settings,
    registry: Registry,
}

impl Engine {
    /// An engine with the built-in functions.
    pub fn new(settings: Settings) -> Self {
        Self::with_registry(settings, Registry::with_builtins())
    }

    /// An engine with a custom function table.
    pub fn with_registry(settings: Settings, registry: Registry) -> Self {
        Self { settings, registry }
    }

    /// The settings this engine runs with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The function table used for parsing.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Walk the root in sorted order, skipping hidden entries and output
    /// directories.
    pub fn scan(&self) -> Result<Scan> {
        let root = normalize(&self.settings.root);
        log::info!("Scanning {}", root.display());
        let mut scan = Scan::default();
        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped(entry));
        for entry in walker {
            let entry = entry.map_err(|e| Error::io("scan", &root, e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if is_description(&path) {
                scan.descriptions.push(path.clone());
            }
            scan.files.push(path);
        }
        log::debug!(
            "found {} files, {} descriptions",
            scan.files.len(),
            scan.descriptions.len()
        );
        Ok(scan)
    }

    /// Parse every description file of `scan`, keeping discovery order.
    pub fn load(&self, scan: &Scan) -> Result<Vec<Target>> {
        log::info!("Parsing {} description files", scan.descriptions.len());
        let mut targets = Vec::new();
        for file in &scan.descriptions {
            let parsed = parse_file(file, &self.registry)?;
            log::debug!("{}: {} targets", file.display(), parsed.len());
            targets.extend(parsed);
        }
        Ok(targets)
    }

    /// Scan, parse, register scanned files, and declare every target.
    pub fn prepare(&self) -> Result<(Context, Vec<Target>)> {
        let scan = self.scan()?;
        let mut targets = self.load(&scan)?;
        let context = Context::new(self.settings.clone());
        for file in &scan.files {
            context.gates().add_open(file)?;
        }
        log::info!("Declaring {} targets", targets.len());
        for target in &mut targets {
            target.declare(&context).map_err(|e| Error::Declare {
                target: target.name().to_string(),
                source: Box::new(e),
            })?;
        }
        Ok((context, targets))
    }

    /// Prepare and execute every target. The first error aborts the run.
    pub fn run(&self) -> Result<Build> {
        let start = Instant::now();
        let (context, targets) = self.prepare()?;
        execute(&context, &targets)?;
        let elapsed = start.elapsed();
        log::info!("Done {}", format_elapsed(elapsed));
        Ok(Build {
            context,
            targets,
            elapsed,
        })
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || (entry.file_type().is_dir() && name == OUTPUT_DIR)
}

/// Build every target concurrently, bounded by the throttle and the global
/// deadline.
fn execute(context: &Context, targets: &[Target]) -> Result<()> {
    if targets.is_empty() {
        return Ok(());
    }
    let max_build = context.settings().max_build;
    log::info!(
        "Building {} targets with {} workers",
        targets.len(),
        context.settings().workers()
    );
    let deadline = Instant::now() + max_build;
    let (tx, rx) = mpsc::channel::<TargetOutcome>();

    thread::scope(|s| {
        let dispatch_tx = tx.clone();
        s.spawn(move || {
            for (index, target) in targets.iter().enumerate() {
                if context.throttle().acquire(Some(deadline)) != Acquire::Granted {
                    for skipped in index..targets.len() {
                        let _ = dispatch_tx.send(TargetOutcome::Skipped { index: skipped });
                    }
                    return;
                }
                let tx = dispatch_tx.clone();
                s.spawn(move || {
                    let start = Instant::now();
                    let result = target.build(context);
                    context.throttle().release();
                    let outcome = match result {
                        Ok(()) => TargetOutcome::Built {
                            index,
                            elapsed: start.elapsed(),
                        },
                        Err(error) => {
                            if !error.is_cancelled() {
                                context.cancel();
                            }
                            TargetOutcome::Failed { index, error }
                        }
                    };
                    let _ = tx.send(outcome);
                });
            }
        });
        drop(tx);

        let mut finished = vec![false; targets.len()];
        let mut remaining = targets.len();
        let mut first_error: Option<Error> = None;
        let mut cancelled = false;
        let mut timed_out = false;
        let mut stragglers = Vec::new();

        while remaining > 0 {
            let received = if timed_out {
                rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
            } else {
                rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            };
            let outcome = match received {
                Ok(outcome) => outcome,
                Err(RecvTimeoutError::Timeout) => {
                    timed_out = true;
                    for (target, _) in targets.iter().zip(&finished).filter(|(_, done)| !**done) {
                        log::error!(
                            "{target} still running {}",
                            target.last_command().unwrap_or_default()
                        );
                        stragglers.push(target.name().to_string());
                    }
                    context.cancel();
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            };
            remaining -= 1;
            match outcome {
                TargetOutcome::Built { index, elapsed } => {
                    finished[index] = true;
                    log::debug!("{} built in {elapsed:.2?}", targets[index]);
                }
                TargetOutcome::Failed { index, error } => {
                    finished[index] = true;
                    if error.is_cancelled() {
                        cancelled = true;
                    } else {
                        log::debug!("{} failed: {error}", targets[index]);
                        first_error.get_or_insert(error);
                    }
                }
                TargetOutcome::Skipped { index } => {
                    finished[index] = true;
                    cancelled = true;
                }
            }
        }

        if let Some(error) = first_error {
            return Err(error);
        }
        if timed_out {
            return Err(Error::BuildTimeout {
                bound: max_build,
                stragglers,
            });
        }
        if cancelled || context.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    })
}

/// Render a duration the way the build summary prints it: `3s`, `2m:05s`,
/// `1h:02m:03s`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (hours, minutes, seconds) = (total / 3600, total / 60 % 60, total % 60);
    if hours > 0 {
        format!("{hours}h:{minutes:02}m:{seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m:{seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}

/// Returns `true` if `path` is a description file by name.
pub fn is_description(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == DESCRIPTION_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn elapsed_formats() {
        assert_eq!(format_elapsed(Duration::from_millis(3400)), "3s");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2m:05s");
        assert_eq!(format_elapsed(Duration::from_secs(3723)), "1h:02m:03s");
        assert_eq!(format_elapsed(Duration::ZERO), "0s");
    }

    #[test]
    fn default_engine_has_the_builtins() {
        let engine = Engine::new(Settings::new("proj"));
        assert_eq!(engine.settings().root, PathBuf::from("proj"));
        assert!(engine.registry().names().contains(&"Exec"));
        assert_eq!(engine.registry().names().len(), 9);
    }

    #[test]
    fn scan_skips_hidden_and_output_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b/out")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::write(root.join("b/flint"), "").unwrap();
        fs::write(root.join("a/flint"), "").unwrap();
        fs::write(root.join("a/main.c"), "").unwrap();
        fs::write(root.join("b/out/built.o"), "").unwrap();
        fs::write(root.join(".git/HEAD"), "").unwrap();
        fs::write(root.join(".hidden"), "").unwrap();

        let scan = Engine::new(Settings::new(root)).scan().unwrap();
        let relative: Vec<_> = scan
            .files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            relative,
            vec![
                PathBuf::from("a/flint"),
                PathBuf::from("a/main.c"),
                PathBuf::from("b/flint"),
            ]
        );
        assert_eq!(scan.descriptions.len(), 2);
        assert!(scan.descriptions.iter().all(|p| is_description(p)));
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::new(Settings::new(dir.path().join("absent")));
        assert!(matches!(engine.scan(), Err(Error::Io { .. })));
    }

    #[test]
    fn empty_root_builds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let build = Engine::new(Settings::new(dir.path())).run().unwrap();
        assert!(build.targets().is_empty());
    }

    #[test]
    fn declare_errors_name_the_target() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("flint"),
            "Exec(name = \"a\" command = \"true\" output = [\"x\"])\nExec(name = \"b\" command = \"true\" output = [\"x\"])\n",
        )
        .unwrap();
        let err = Engine::new(Settings::new(dir.path())).prepare().unwrap_err();
        match err {
            Error::Declare { target, source } => {
                assert_eq!(target, "b");
                assert!(matches!(*source, Error::GateAlreadyPending { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn global_timeout_names_stragglers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("flint"),
            "Exec(name = \"slow\" command = \"sleep 5\")\n",
        )
        .unwrap();
        let mut settings = Settings::new(dir.path());
        settings.max_build = Duration::from_millis(200);
        let start = Instant::now();
        let err = Engine::new(settings).run().unwrap_err();
        match err {
            Error::BuildTimeout { stragglers, .. } => assert_eq!(stragglers, vec!["slow"]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
