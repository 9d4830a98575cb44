//! `Set` and `Get`: plain string properties.

use super::{NAME, VALUE, Function};
use crate::context::{DeclareCx, ExecCx};
use crate::error::Result;
use crate::expr::{Expr, Params};

/// `Set(name = "key" value = "text")` publishes a property during declare.
#[derive(Debug)]
pub struct Set {
    key: String,
    value: String,
}

impl Set {
    /// Build from literal `name` and `value`.
    pub fn create(mut params: Params) -> Result<Self> {
        let key = params.take_literal(NAME)?;
        let value = params.take_literal(VALUE)?;
        params.finish()?;
        Ok(Self { key, value })
    }
}

impl Function for Set {
    fn target_name(&self) -> String {
        format!("Set:{}", self.key)
    }

    fn declare(&mut self, cx: &mut DeclareCx<'_>) -> Result<()> {
        cx.set_property(self.key.as_str(), self.value.as_str());
        Ok(())
    }

    fn resolve(&self, _cx: &ExecCx<'_>) -> Result<String> {
        Ok(self.value.clone())
    }
}

/// `Get("key")` or `Get(name = "key")` reads a property.
#[derive(Debug)]
pub struct Get {
    key: String,
}

impl Get {
    /// Build from `name` or the anonymous parameter.
    pub fn create(mut params: Params) -> Result<Self> {
        let key = literal_key(&mut params)?;
        params.finish()?;
        Ok(Self { key })
    }
}

impl Function for Get {
    fn target_name(&self) -> String {
        format!("Get:{}", self.key)
    }

    fn resolve(&self, cx: &ExecCx<'_>) -> Result<String> {
        cx.property(&self.key)
    }
}

/// The `name` parameter, or the anonymous one, as a literal.
pub(super) fn literal_key(params: &mut Params) -> Result<String> {
    match params.take_named_or_anonymous(NAME)? {
        Expr::Literal(key) => Ok(key),
        _ => Err(params.invalid(NAME, "expects a string")),
    }
}
