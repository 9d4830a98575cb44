//! The expression tree produced by the parser.
//!
//! An [`Expr`] is a literal, a list, or a function [`Call`]. Expressions have
//! two lifecycle steps: a one-time, sequential [`declare`](Expr::declare)
//! step that may register gates and properties, and a concurrent
//! [`resolve`](Expr::resolve) step run by the owning target's worker.

use std::collections::BTreeMap;
use std::fmt;

use crate::context::{DeclareCx, ExecCx};
use crate::error::{Error, Result};
use crate::function::{ANONYMOUS, Function};
use crate::syntax::Location;

/// A node of the expression tree.
#[derive(Debug)]
pub enum Expr {
    /// An already-resolved string.
    Literal(String),
    /// An ordered sequence, flattened on resolution.
    List(Vec<Expr>),
    /// A function call.
    Call(Call),
}

impl Expr {
    /// Run the declare step of every call in this expression.
    pub fn declare(&mut self, cx: &mut DeclareCx<'_>) -> Result<()> {
        match self {
            Self::Literal(_) => Ok(()),
            Self::List(items) => items.iter_mut().try_for_each(|item| item.declare(cx)),
            Self::Call(call) => call.declare(cx),
        }
    }

    /// Resolve to a single string. Lists join their flattened values with a space.
    pub fn resolve(&self, cx: &ExecCx<'_>) -> Result<String> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::List(_) => Ok(self.resolve_list(cx)?.join(" ")),
            Self::Call(call) => call.resolve(cx),
        }
    }

    /// Resolve to a flat list of strings, whatever the nesting depth.
    pub fn resolve_list(&self, cx: &ExecCx<'_>) -> Result<Vec<String>> {
        match self {
            Self::Literal(value) => Ok(vec![value.clone()]),
            Self::List(items) => {
                let mut values = Vec::new();
                for item in items {
                    values.extend(item.resolve_list(cx)?);
                }
                Ok(values)
            }
            Self::Call(call) => call.resolve_list(cx),
        }
    }

    /// The literal value, if this is a literal.
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// The flattened values of an expression built only from literals and
    /// lists. Returns `None` if any call is involved.
    pub fn literals(&self) -> Option<Vec<String>> {
        match self {
            Self::Literal(value) => Some(vec![value.clone()]),
            Self::List(items) => {
                let mut values = Vec::new();
                for item in items {
                    values.extend(item.literals()?);
                }
                Some(values)
            }
            Self::Call(_) => None,
        }
    }
}

/// A function call: its name, where it was written, and the instantiated
/// implementation that owns the call's parameters.
pub struct Call {
    name: String,
    location: Location,
    function: Box<dyn Function>,
}

impl Call {
    /// Wrap an instantiated function.
    pub fn new(name: impl Into<String>, location: Location, function: Box<dyn Function>) -> Self {
        Self {
            name: name.into(),
            location,
            function,
        }
    }

    /// The function name as written in the description file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the call was written.
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// The implementation behind the call.
    pub fn function(&self) -> &dyn Function {
        self.function.as_ref()
    }

    /// Run the function's declare step.
    pub fn declare(&mut self, cx: &mut DeclareCx<'_>) -> Result<()> {
        self.function.declare(cx)
    }

    /// Resolve the call to a single string.
    pub fn resolve(&self, cx: &ExecCx<'_>) -> Result<String> {
        self.function.resolve(cx)
    }

    /// Resolve the call to a list of strings.
    pub fn resolve_list(&self, cx: &ExecCx<'_>) -> Result<Vec<String>> {
        self.function.resolve_list(cx)
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("name", &self.name)
            .field("function", &self.function)
            .finish_non_exhaustive()
    }
}

/// The parameters of one call, keyed by name.
///
/// Factories take what they need out of the map and call
/// [`finish`](Params::finish), which rejects anything left over.
#[derive(Debug)]
pub struct Params {
    function: String,
    location: Location,
    entries: BTreeMap<String, Expr>,
}

impl Params {
    /// An empty parameter map for a call to `function` written at `location`.
    pub fn new(function: impl Into<String>, location: Location) -> Self {
        Self {
            function: function.into(),
            location,
            entries: BTreeMap::new(),
        }
    }

    /// Add a parameter. Returns `false` if the key was already present.
    pub fn insert(&mut self, key: impl Into<String>, value: Expr) -> bool {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, value);
        true
    }

    /// Returns `true` if the parameter is present.
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove a required parameter.
    pub fn take(&mut self, key: &str) -> Result<Expr> {
        self.entries
            .remove(key)
            .ok_or_else(|| Error::MissingParameter {
                function: self.owner(),
                key: key.to_string(),
            })
    }

    /// Remove an optional parameter.
    pub fn take_optional(&mut self, key: &str) -> Option<Expr> {
        self.entries.remove(key)
    }

    /// Remove a required parameter that must be a string literal.
    pub fn take_literal(&mut self, key: &str) -> Result<String> {
        let expr = self.take(key)?;
        self.expect_literal(key, expr)
    }

    /// Remove an optional parameter that must be a string literal if present.
    pub fn take_optional_literal(&mut self, key: &str) -> Result<Option<String>> {
        match self.take_optional(key) {
            Some(expr) => self.expect_literal(key, expr).map(Some),
            None => Ok(None),
        }
    }

    /// Remove `key`, falling back to the anonymous parameter.
    pub fn take_named_or_anonymous(&mut self, key: &str) -> Result<Expr> {
        if self.has(key) {
            self.take(key)
        } else {
            self.take(ANONYMOUS)
        }
    }

    /// Build an [`Error::InvalidParameter`] for this call.
    pub fn invalid(&self, key: &str, reason: impl Into<String>) -> Error {
        Error::InvalidParameter {
            function: self.owner(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Reject any parameter the factory did not consume.
    pub fn finish(self) -> Result<()> {
        match self.entries.keys().next() {
            Some(key) => Err(self.invalid(key, "is not recognised")),
            None => Ok(()),
        }
    }

    fn expect_literal(&self, key: &str, expr: Expr) -> Result<String> {
        match expr {
            Expr::Literal(value) => Ok(value),
            _ => Err(self.invalid(key, "expects a string")),
        }
    }

    fn owner(&self) -> String {
        format!("{} at {}", self.function, self.location)
    }
}
