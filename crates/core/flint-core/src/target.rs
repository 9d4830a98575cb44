//! Build units: one per top-level call in a description file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

use crate::context::{Context, DeclareCx, ExecCx};
use crate::error::Result;
use crate::expr::Call;

/// Lifecycle of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// Parsed, not yet declared.
    Created,
    /// Declared; outputs and properties are registered.
    Declared,
    /// Running on a worker.
    Building,
    /// Finished with a value.
    Built,
    /// Finished with an error.
    Failed,
}

/// A top-level call together with where it came from and how far it got.
#[derive(Debug)]
pub struct Target {
    name: String,
    file: PathBuf,
    directory: PathBuf,
    root: Call,
    outputs: Vec<PathBuf>,
    state: Mutex<TargetState>,
    last_command: Mutex<Option<String>>,
    value: OnceLock<String>,
}

impl Target {
    /// A target for `root`, defined in the description file `file`.
    pub fn new(file: PathBuf, root: Call) -> Self {
        let directory = file
            .parent()
            .map_or_else(PathBuf::new, Path::to_path_buf);
        Self {
            name: root.name().to_string(),
            file,
            directory,
            root,
            outputs: Vec::new(),
            state: Mutex::new(TargetState::Created),
            last_command: Mutex::new(None),
            value: OnceLock::new(),
        }
    }

    /// Name the target after its root function and run the declare step.
    pub fn declare(&mut self, context: &Context) -> Result<()> {
        self.name = self.root.function().target_name();
        let mut cx = DeclareCx::new(context, &self.file, &self.directory);
        let declared = self.root.declare(&mut cx);
        self.outputs = cx.into_outputs();
        self.set_state(if declared.is_ok() {
            TargetState::Declared
        } else {
            TargetState::Failed
        });
        declared
    }

    /// Resolve the root call. Called once, from a worker thread.
    pub fn build(&self, context: &Context) -> Result<()> {
        self.set_state(TargetState::Building);
        log::debug!("building {self}");
        let cx = ExecCx::new(context, self);
        match self.root.resolve(&cx) {
            Ok(value) => {
                let _ = self.value.set(value);
                self.set_state(TargetState::Built);
                Ok(())
            }
            Err(e) => {
                self.set_state(TargetState::Failed);
                Err(e)
            }
        }
    }

    pub(crate) fn record_command(&self, command: &str) {
        *self
            .last_command
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(command.to_string());
    }

    fn set_state(&self, state: TargetState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// The declared name, e.g. `Get:key` or an `Exec` name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The description file this target was parsed from.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// The directory relative paths resolve against.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The top-level call.
    pub fn root(&self) -> &Call {
        &self.root
    }

    /// Absolute paths this target registered as outputs.
    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TargetState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The most recent command this target ran, if any.
    pub fn last_command(&self) -> Option<String> {
        self.last_command
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The value of the root call, once built.
    pub fn value(&self) -> Option<&str> {
        self.value.get().map(String::as_str)
    }

    /// Returns `true` once the target has finished successfully.
    pub fn is_built(&self) -> bool {
        self.state() == TargetState::Built
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
