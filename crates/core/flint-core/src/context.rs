//! Shared build state and the capabilities handed to each phase.
//!
//! [`Context`] owns everything targets share: settings, properties, gates,
//! the worker throttle, and the cancellation flag. Functions never see it
//! directly. During the declare phase they get a [`DeclareCx`], which can
//! register gates; during the execute phase they get an [`ExecCx`], which can
//! only wait on, open, and run things.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::command::{CommandOutput, ShellCommand};
use crate::error::{Error, Result};
use crate::gate::{Gates, normalize};
use crate::property::Properties;
use crate::settings::Settings;
use crate::target::Target;

/// Engine-scoped state shared by every target of one run.
#[derive(Debug)]
pub struct Context {
    settings: Settings,
    properties: Properties,
    gates: Gates,
    throttle: Throttle,
    cancelled: AtomicBool,
}

impl Context {
    /// Fresh state for a run with `settings`. Seed properties are set up front.
    pub fn new(settings: Settings) -> Self {
        let properties = Properties::new();
        for (key, value) in &settings.properties {
            properties.set(key.as_str(), value.as_str());
        }
        let throttle = Throttle::new(settings.workers());
        Self {
            settings,
            properties,
            gates: Gates::new(),
            throttle,
            cancelled: AtomicBool::new(false),
        }
    }

    /// The settings the run was started with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The shared property store.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// The shared gate registry.
    pub fn gates(&self) -> &Gates {
        &self.gates
    }

    pub(crate) fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// Abort the run: wake every parked await and slot waiter, and make
    /// running commands kill their children.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            log::debug!("cancelling build");
        }
        self.gates.cancel();
        self.throttle.cancel();
    }

    /// Returns `true` once [`Context::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Outcome of waiting for a worker slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Acquire {
    Granted,
    Cancelled,
    TimedOut,
}

#[derive(Debug)]
struct Slots {
    available: usize,
    cancelled: bool,
}

/// Counting semaphore bounding how many targets run at once.
#[derive(Debug)]
pub(crate) struct Throttle {
    slots: Mutex<Slots>,
    freed: Condvar,
}

impl Throttle {
    pub(crate) fn new(slots: usize) -> Self {
        Self {
            slots: Mutex::new(Slots {
                available: slots.max(1),
                cancelled: false,
            }),
            freed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a slot, waiting until one is free, the deadline passes, or the
    /// throttle is cancelled.
    pub(crate) fn acquire(&self, deadline: Option<Instant>) -> Acquire {
        let mut slots = self.lock();
        loop {
            if slots.cancelled {
                return Acquire::Cancelled;
            }
            if slots.available > 0 {
                slots.available -= 1;
                return Acquire::Granted;
            }
            slots = match deadline {
                None => self
                    .freed
                    .wait(slots)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Acquire::TimedOut;
                    }
                    self.freed
                        .wait_timeout(slots, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    pub(crate) fn release(&self) {
        self.lock().available += 1;
        self.freed.notify_one();
    }

    pub(crate) fn cancel(&self) {
        self.lock().cancelled = true;
        self.freed.notify_all();
    }
}

/// Capabilities of the declare phase.
pub struct DeclareCx<'a> {
    context: &'a Context,
    file: &'a Path,
    directory: PathBuf,
    outputs: Vec<PathBuf>,
}

impl<'a> DeclareCx<'a> {
    /// Declare-phase view for a target defined in `file`.
    pub fn new(context: &'a Context, file: &'a Path, directory: &Path) -> Self {
        Self {
            context,
            file,
            directory: normalize(directory),
            outputs: Vec::new(),
        }
    }

    /// The description file being declared.
    pub fn file(&self) -> &Path {
        self.file
    }

    /// Absolute directory of the description file.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Resolve `path` against the target directory.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        normalize(&self.directory.join(path))
    }

    /// Settings of the run.
    pub fn settings(&self) -> &Settings {
        &self.context.settings
    }

    /// Register a file this target will produce.
    pub fn add_output(&mut self, path: &Path) -> Result<()> {
        let path = self.resolve_path(path);
        self.context.gates.add_pending(&path)?;
        self.outputs.push(path);
        Ok(())
    }

    /// Register a file that already exists.
    pub fn add_existing(&mut self, path: &Path) -> Result<()> {
        self.context.gates.add_open(&self.resolve_path(path))
    }

    /// Publish a property for other targets.
    pub fn set_property(&self, key: impl Into<String>, value: impl Into<String>) {
        self.context.properties.set(key, value);
    }

    /// Read a property set by a seed or an earlier declare.
    pub fn property(&self, key: &str) -> Result<String> {
        self.context.properties.get(key)
    }

    /// The outputs registered so far, in registration order.
    pub fn into_outputs(self) -> Vec<PathBuf> {
        self.outputs
    }
}

/// Capabilities of the execute phase.
pub struct ExecCx<'a> {
    context: &'a Context,
    target: &'a Target,
    directory: PathBuf,
}

impl<'a> ExecCx<'a> {
    /// Execute-phase view for `target`.
    pub fn new(context: &'a Context, target: &'a Target) -> Self {
        Self {
            context,
            target,
            directory: normalize(target.directory()),
        }
    }

    /// Absolute directory of the target's description file.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Resolve `path` against the target directory.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        normalize(&self.directory.join(path))
    }

    /// Settings of the run.
    pub fn settings(&self) -> &Settings {
        &self.context.settings
    }

    /// Returns `true` when the run deletes outputs instead of producing them.
    pub fn is_cleaning(&self) -> bool {
        self.context.settings.clean
    }

    /// Read a property.
    pub fn property(&self, key: &str) -> Result<String> {
        self.context.properties.get(key)
    }

    /// Publish a property. Last write wins.
    pub fn set_property(&self, key: impl Into<String>, value: impl Into<String>) {
        self.context.properties.set(key, value);
    }

    /// Block until `path` is available.
    ///
    /// The worker gives its throttle slot back while parked and takes one
    /// again before returning, so waiting consumers never starve producers.
    pub fn await_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = self.resolve_path(path);
        let gates = &self.context.gates;
        if gates.is_open(&path) {
            return Ok(());
        }
        log::debug!("{} waiting for {}", self.target, path.display());
        let throttle = &self.context.throttle;
        throttle.release();
        let waited = gates.await_open(&path, self.context.settings.max_wait);
        let resumed = throttle.acquire(None);
        waited?;
        match resumed {
            Acquire::Granted => Ok(()),
            Acquire::Cancelled | Acquire::TimedOut => Err(Error::Cancelled),
        }
    }

    /// Open the gate of a file this target has written.
    pub fn provide_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = self.resolve_path(path);
        if !path.exists() {
            return Err(Error::MissingFile { path });
        }
        if path.is_dir() {
            return Err(Error::NotAFile { path });
        }
        self.context.gates.open(&path)
    }

    /// Open a gate without checking the file.
    pub fn release_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.context.gates.open(&self.resolve_path(path))
    }

    /// Delete a produced file, then release its gate.
    pub fn retire_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = self.resolve_path(path);
        match fs::remove_file(&path) {
            Ok(()) => log::debug!("removed {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io("remove", path, e)),
        }
        self.release_file(&path)
    }

    /// Run `script` through the shell in the target directory.
    ///
    /// The script becomes the target's last command. A non-zero exit is an
    /// error.
    pub fn run_command(&self, script: &str) -> Result<CommandOutput> {
        if self.context.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.target.record_command(script);
        ShellCommand::new(script)
            .current_dir(&self.directory)
            .run_checked(|| self.context.is_cancelled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn seed_properties_are_visible() {
        let mut settings = Settings::new(".");
        settings.properties.insert("mode".into(), "release".into());
        let context = Context::new(settings);
        assert_eq!(context.properties().get("mode").unwrap(), "release");
    }

    #[test]
    fn throttle_bounds_slots() {
        let throttle = Throttle::new(1);
        assert_eq!(throttle.acquire(None), Acquire::Granted);
        let soon = Instant::now() + Duration::from_millis(20);
        assert_eq!(throttle.acquire(Some(soon)), Acquire::TimedOut);
        throttle.release();
        assert_eq!(throttle.acquire(Some(soon)), Acquire::Granted);
    }

    #[test]
    fn throttle_cancel_wakes_waiters() {
        let throttle = Throttle::new(1);
        assert_eq!(throttle.acquire(None), Acquire::Granted);
        thread::scope(|s| {
            let waiter = s.spawn(|| throttle.acquire(None));
            thread::sleep(Duration::from_millis(30));
            throttle.cancel();
            assert_eq!(waiter.join().unwrap(), Acquire::Cancelled);
        });
    }

    #[test]
    fn declare_paths_are_relative_to_the_target() {
        let context = Context::new(Settings::new("."));
        let file = Path::new("/proj/sub/flint");
        let mut cx = DeclareCx::new(&context, file, Path::new("/proj/sub"));
        assert_eq!(cx.file(), file);
        assert_eq!(cx.resolve_path("../lib/a.jar"), PathBuf::from("/proj/lib/a.jar"));
        assert_eq!(cx.resolve_path("/abs/x"), PathBuf::from("/abs/x"));
        cx.add_output(Path::new("out/x.txt")).unwrap();
        assert_eq!(cx.into_outputs(), vec![PathBuf::from("/proj/sub/out/x.txt")]);
        assert!(!context.gates().is_open(Path::new("/proj/sub/out/x.txt")));
    }

    #[test]
    fn cancel_reaches_every_part() {
        let context = Context::new(Settings::new("."));
        context.gates().add_pending(Path::new("/w")).unwrap();
        context.cancel();
        assert!(context.is_cancelled());
        assert!(matches!(
            context.gates().await_open(Path::new("/w"), Duration::from_secs(1)),
            Err(Error::Cancelled)
        ));
        assert_eq!(context.throttle().acquire(None), Acquire::Cancelled);
    }
}
