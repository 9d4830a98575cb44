//! Build functions and the name-to-implementation registry.
//!
//! Each function name in a description file maps to a [`Factory`] that
//! validates the call's [`Params`] into a typed struct and returns it boxed
//! as a [`Function`]. The built-in table is assembled once by
//! [`Registry::with_builtins`]; embedders can add their own steps with
//! [`Registry::register`].

mod exec;
mod file;
mod library;
mod platform;
mod property;
mod release;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::{DeclareCx, ExecCx};
use crate::error::Result;
use crate::expr::Params;

pub use exec::Exec;
pub use file::{Find, GetFile, SetFile};
pub use library::Library;
pub use platform::Platform;
pub use property::{Get, Set};
pub use release::Release;

/// Key of the single unnamed parameter, as in `Get("key")`.
pub const ANONYMOUS: &str = "-";

// Parameter names of the built-in functions.
pub(crate) const NAME: &str = "name";
pub(crate) const VALUE: &str = "value";
pub(crate) const DIRECTORY: &str = "directory";
pub(crate) const PATTERN: &str = "pattern";
pub(crate) const FILE: &str = "file";
pub(crate) const LOCATION: &str = "location";
pub(crate) const SOURCE: &str = "source";
pub(crate) const REQUIRE: &str = "require";
pub(crate) const CHANNEL: &str = "channel";
pub(crate) const COMMAND: &str = "command";
pub(crate) const INPUT: &str = "input";
pub(crate) const OUTPUT: &str = "output";
pub(crate) const LINUX: &str = "linux";
pub(crate) const MAC: &str = "mac";
pub(crate) const WINDOWS: &str = "windows";

/// A build step instantiated from one call in a description file.
///
/// `declare` runs once, sequentially, before any target executes. `resolve`
/// runs on the owning target's worker thread, concurrently with other
/// targets, and may block on file gates.
pub trait Function: fmt::Debug + Send + Sync {
    /// Name given to a target whose root call is this function.
    fn target_name(&self) -> String;

    /// Register outputs and properties. The default does nothing.
    fn declare(&mut self, _cx: &mut DeclareCx<'_>) -> Result<()> {
        Ok(())
    }

    /// Produce the function's value.
    fn resolve(&self, cx: &ExecCx<'_>) -> Result<String>;

    /// Produce the function's value as a list.
    fn resolve_list(&self, cx: &ExecCx<'_>) -> Result<Vec<String>> {
        Ok(vec![self.resolve(cx)?])
    }
}

/// Builds a [`Function`] from a call's parameters.
pub type Factory = Arc<dyn Fn(Params) -> Result<Box<dyn Function>> + Send + Sync>;

/// Name-to-factory table consulted by the parser.
#[derive(Clone, Default)]
pub struct Registry {
    factories: HashMap<String, Factory>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in function.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("Set", |p| Ok(Box::new(Set::create(p)?)));
        registry.register("Get", |p| Ok(Box::new(Get::create(p)?)));
        registry.register("SetFile", |p| Ok(Box::new(SetFile::create(p)?)));
        registry.register("GetFile", |p| Ok(Box::new(GetFile::create(p)?)));
        registry.register("Find", |p| Ok(Box::new(Find::create(p)?)));
        registry.register("Platform", |p| Ok(Box::new(Platform::create(p)?)));
        registry.register("Library", |p| Ok(Box::new(Library::create(p)?)));
        registry.register("Release", |p| Ok(Box::new(Release::create(p)?)));
        registry.register("Exec", |p| Ok(Box::new(Exec::create(p)?)));
        registry
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(Params) -> Result<Box<dyn Function>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Look up the factory for `name`.
    pub fn lookup(&self, name: &str) -> Option<Factory> {
        self.factories.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("functions", &self.names())
            .finish()
    }
}
