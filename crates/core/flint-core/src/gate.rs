//! File-availability gates.
//!
//! A gate per file path orders producers and consumers without a dependency
//! graph: producers register their outputs as pending during the declare
//! phase and open them once written, while consumers block in
//! [`Gates::await_open`] until the file they need is open.

use std::collections::HashMap;
use std::env;
use std::path::{Component, Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Whether a registered file can be consumed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Some target will produce the file but has not yet.
    Pending,
    /// The file is available.
    Open,
}

#[derive(Debug, Default)]
struct GateTable {
    gates: HashMap<PathBuf, GateState>,
    cancelled: bool,
}

/// Registry of gates keyed by absolute, normalized path.
#[derive(Debug, Default)]
pub struct Gates {
    table: Mutex<GateTable>,
    changed: Condvar,
}

impl Gates {
    /// An empty, uncancelled registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, GateTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a file some target will produce.
    ///
    /// A path that is open because it existed at scan time is re-armed; a
    /// path that is already pending has another producer and is rejected.
    pub fn add_pending(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let mut table = self.lock();
        match table.gates.get(&path) {
            Some(GateState::Pending) => Err(Error::GateAlreadyPending { path }),
            _ => {
                log::trace!("gate {} pending", path.display());
                table.gates.insert(path, GateState::Pending);
                Ok(())
            }
        }
    }

    /// Register a file that is already available.
    pub fn add_open(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let mut table = self.lock();
        match table.gates.get(&path) {
            Some(GateState::Pending) => Err(Error::GateAlreadyPending { path }),
            _ => {
                table.gates.insert(path, GateState::Open);
                Ok(())
            }
        }
    }

    /// Mark a registered file as available and wake every waiter.
    pub fn open(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let mut table = self.lock();
        match table.gates.get_mut(&path) {
            Some(state) => {
                if *state == GateState::Pending {
                    log::trace!("gate {} open", path.display());
                    *state = GateState::Open;
                    self.changed.notify_all();
                }
                Ok(())
            }
            None => Err(Error::GateNotRegistered { path }),
        }
    }

    /// The current state of a gate, if registered.
    pub fn state(&self, path: &Path) -> Option<GateState> {
        self.lock().gates.get(&normalize(path)).copied()
    }

    /// Returns `true` if `path` is registered and open.
    pub fn is_open(&self, path: &Path) -> bool {
        self.state(path) == Some(GateState::Open)
    }

    /// Block until `path` is open.
    ///
    /// Fails immediately if nothing registered the path, after `bound` if it
    /// stays pending, and as soon as the registry is cancelled.
    pub fn await_open(&self, path: &Path, bound: Duration) -> Result<()> {
        let path = normalize(path);
        let deadline = Instant::now() + bound;
        let mut table = self.lock();
        loop {
            if table.cancelled {
                return Err(Error::Cancelled);
            }
            match table.gates.get(&path) {
                Some(GateState::Open) => return Ok(()),
                None => return Err(Error::NoProducer { path }),
                Some(GateState::Pending) => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::AwaitTimeout { path, bound });
            }
            table = self
                .changed
                .wait_timeout(table, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Fail every current and future await with [`Error::Cancelled`].
    pub fn cancel(&self) {
        self.lock().cancelled = true;
        self.changed.notify_all();
    }

    /// Paths still pending, sorted.
    pub fn pending(&self) -> Vec<PathBuf> {
        let mut pending: Vec<PathBuf> = self
            .lock()
            .gates
            .iter()
            .filter(|(_, state)| **state == GateState::Pending)
            .map(|(path, _)| path.clone())
            .collect();
        pending.sort();
        pending
    }
}

/// Make `path` absolute and fold `.` and `..` components without touching
/// the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
