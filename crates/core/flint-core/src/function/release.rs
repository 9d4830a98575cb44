//! `Release`: push a finished artifact through distribution channels.

use super::{CHANNEL, Function, REQUIRE, SOURCE};
use crate::context::{DeclareCx, ExecCx};
use crate::error::Result;
use crate::expr::{Expr, Params};

/// `Release(source = "app" require = ["tests"] channel = ["cp %s /dist"])`.
///
/// `source` and each entry of `require` name properties holding file paths.
/// Every required file and the source file are awaited, then each channel
/// command runs with `%s` replaced by the source path. Nothing is pushed in
/// clean mode.
#[derive(Debug)]
pub struct Release {
    source: String,
    require: Option<Expr>,
    channel: Expr,
}

impl Release {
    /// Build from `source`, `channel`, and an optional `require`.
    pub fn create(mut params: Params) -> Result<Self> {
        let source = params.take_literal(SOURCE)?;
        let require = params.take_optional(REQUIRE);
        let channel = params.take(CHANNEL)?;
        params.finish()?;
        Ok(Self {
            source,
            require,
            channel,
        })
    }
}

impl Function for Release {
    fn target_name(&self) -> String {
        format!("Release:{}", self.source)
    }

    fn declare(&mut self, cx: &mut DeclareCx<'_>) -> Result<()> {
        if let Some(require) = &mut self.require {
            require.declare(cx)?;
        }
        self.channel.declare(cx)
    }

    fn resolve(&self, cx: &ExecCx<'_>) -> Result<String> {
        if cx.is_cleaning() {
            return Ok(String::new());
        }
        if let Some(require) = &self.require {
            for key in require.resolve_list(cx)? {
                cx.await_file(cx.property(&key)?)?;
            }
        }
        let path = cx.property(&self.source)?;
        cx.await_file(&path)?;
        for channel in self.channel.resolve_list(cx)? {
            cx.run_command(&channel.replace("%s", &path))?;
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::context::Context;
    use crate::error::Error;
    use crate::function::Registry;
    use crate::settings::Settings;
    use crate::syntax::parser::parse_str;

    #[test]
    fn channels_receive_the_source_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.bin"), "bin").unwrap();
        fs::create_dir(dir.path().join("dist")).unwrap();
        let context = Context::new(Settings::new(dir.path()));
        let mut targets = parse_str(
            r#"
SetFile(name = "app" value = "app.bin")
Release(source = "app" channel = ["cp %s dist/copy.bin"])
"#,
            dir.path().join("flint"),
            &Registry::with_builtins(),
        )
        .unwrap();
        for target in &mut targets {
            target.declare(&context).unwrap();
        }
        targets[1].build(&context).unwrap();
        assert!(dir.path().join("dist/copy.bin").is_file());
        assert_eq!(targets[1].name(), "Release:app");
        assert_eq!(
            targets[1].last_command().unwrap(),
            format!("cp {} dist/copy.bin", dir.path().join("app.bin").display())
        );
    }

    #[test]
    fn missing_requirement_fails() {
        let dir = tempfile::tempdir().unwrap();
        let context = Context::new(Settings::new(dir.path()));
        let mut targets = parse_str(
            r#"Release(source = "app" require = ["tests"] channel = "true")"#,
            dir.path().join("flint"),
            &Registry::with_builtins(),
        )
        .unwrap();
        targets[0].declare(&context).unwrap();
        assert!(matches!(
            targets[0].build(&context),
            Err(Error::MissingProperty { key }) if key == "tests"
        ));
    }
}
