//! Build orchestration engine for flint.
//!
//! A build is described by `flint` files anywhere under a root directory.
//! Each top-level function call in a description file is a [`Target`]. The
//! [`Engine`] scans the root, parses every description, declares every target
//! in discovery order, then builds all targets concurrently. Targets that
//! consume another target's output block on that file's gate until the
//! producer opens it; nothing computes a dependency graph up front.
//!
//! ```no_run
//! use flint_core::{Engine, Settings};
//!
//! let build = Engine::new(Settings::new("project")).run()?;
//! for target in build.targets() {
//!     println!("{target}: {}", target.value().unwrap_or_default());
//! }
//! # Ok::<(), flint_core::Error>(())
//! ```

pub mod command;
pub mod context;
pub mod engine;
pub mod error;
pub mod expr;
pub mod function;
pub mod gate;
pub mod property;
pub mod settings;
pub mod syntax;
pub mod target;

pub use context::{Context, DeclareCx, ExecCx};
pub use engine::{Build, DESCRIPTION_FILE, Engine, OUTPUT_DIR, Scan, format_elapsed};
pub use error::{Error, Result};
pub use expr::{Call, Expr, Params};
pub use function::{Factory, Function, Registry};
pub use gate::{GateState, Gates};
pub use property::Properties;
pub use settings::Settings;
pub use target::{Target, TargetState};
