//! `Exec`: run shell commands that turn input files into output files.

use std::fs;
use std::path::PathBuf;

use super::{COMMAND, Function, INPUT, NAME, OUTPUT};
use crate::context::{DeclareCx, ExecCx};
use crate::error::{Error, Result};
use crate::expr::{Expr, Params};

/// `Exec(name = "x" command = "..." input = [..] output = ["out/x.txt"])`.
///
/// `command` is one command, or a list whose top-level items are run one
/// after another (a nested list is joined with spaces into one command).
/// Outputs must be literal paths so they can be registered during declare.
/// The property `name` holds the absolute path of the first output and
/// `name:N` that of output `N` (zero-based) for every later one, so a
/// consumer can `Get` each path and await it.
#[derive(Debug)]
pub struct Exec {
    name: String,
    command: Expr,
    input: Option<Expr>,
    outputs: Vec<String>,
    paths: Vec<PathBuf>,
}

impl Exec {
    /// Build from `name`, `command`, and optional `input` and `output`.
    pub fn create(mut params: Params) -> Result<Self> {
        let name = params.take_literal(NAME)?;
        let command = params.take(COMMAND)?;
        let input = params.take_optional(INPUT);
        let outputs = match params.take_optional(OUTPUT) {
            Some(expr) => expr
                .literals()
                .ok_or_else(|| params.invalid(OUTPUT, "expects string literals"))?,
            None => Vec::new(),
        };
        params.finish()?;
        Ok(Self {
            name,
            command,
            input,
            outputs,
            paths: Vec::new(),
        })
    }

    fn commands(&self, cx: &ExecCx<'_>) -> Result<Vec<String>> {
        match &self.command {
            Expr::List(items) => items.iter().map(|item| item.resolve(cx)).collect(),
            single => Ok(vec![single.resolve(cx)?]),
        }
    }

    fn joined_paths(&self) -> String {
        self.paths
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Property key under which output `index` of `name` is published.
fn output_key(name: &str, index: usize) -> String {
    match index {
        0 => name.to_string(),
        n => format!("{name}:{n}"),
    }
}

impl Function for Exec {
    fn target_name(&self) -> String {
        self.name.clone()
    }

    fn declare(&mut self, cx: &mut DeclareCx<'_>) -> Result<()> {
        self.command.declare(cx)?;
        if let Some(input) = &mut self.input {
            input.declare(cx)?;
        }
        for output in &self.outputs {
            let path = cx.resolve_path(output);
            cx.add_output(&path)?;
            self.paths.push(path);
        }
        for (index, path) in self.paths.iter().enumerate() {
            cx.set_property(output_key(&self.name, index), path.display().to_string());
        }
        if self.paths.is_empty() {
            cx.set_property(self.name.as_str(), "");
        }
        Ok(())
    }

    fn resolve(&self, cx: &ExecCx<'_>) -> Result<String> {
        if cx.is_cleaning() {
            for path in &self.paths {
                cx.retire_file(path)?;
            }
            return Ok(self.joined_paths());
        }

        for path in &self.paths {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io("create", parent, e))?;
            }
        }
        if let Some(input) = &self.input {
            for file in input.resolve_list(cx)? {
                cx.await_file(&file)?;
            }
        }
        for command in self.commands(cx)? {
            cx.run_command(&command)?;
        }
        for path in &self.paths {
            cx.provide_file(path)?;
        }
        Ok(self.joined_paths())
    }

    fn resolve_list(&self, cx: &ExecCx<'_>) -> Result<Vec<String>> {
        self.resolve(cx)?;
        Ok(self.paths.iter().map(|p| p.display().to_string()).collect())
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
    use crate::target::Target;

    fn declare_all(dir: &std::path::Path, src: &str, settings: Settings) -> (Context, Vec<Target>) {
        let context = Context::new(settings);
        let mut targets =
            parse_str(src, dir.join("flint"), &Registry::with_builtins()).unwrap();
        for target in &mut targets {
            target.declare(&context).unwrap();
        }
        (context, targets)
    }

    #[test]
    fn produces_declared_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let (context, targets) = declare_all(
            dir.path(),
            r#"Exec(name = "gen" command = ["echo one > out/a.txt" ["echo" "two" "> out/b.txt"]] output = ["out/a.txt" "out/b.txt"])"#,
            Settings::new(dir.path()),
        );
        let a = dir.path().join("out/a.txt");
        let b = dir.path().join("out/b.txt");
        assert_eq!(context.properties().get("gen").unwrap(), a.display().to_string());
        assert_eq!(context.properties().get("gen:1").unwrap(), b.display().to_string());
        assert_eq!(targets[0].outputs(), &[a.clone(), b.clone()]);

        targets[0].build(&context).unwrap();
        assert_eq!(fs::read_to_string(&a).unwrap(), "one\n");
        assert_eq!(fs::read_to_string(&b).unwrap(), "two\n");
        assert!(context.gates().is_open(&a));
        assert!(context.gates().pending().is_empty());
    }

    #[test]
    fn missing_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (context, targets) = declare_all(
            dir.path(),
            r#"Exec(name = "lazy" command = "true" output = ["never.txt"])"#,
            Settings::new(dir.path()),
        );
        assert!(matches!(
            targets[0].build(&context),
            Err(Error::MissingFile { .. })
        ));
    }

    #[test]
    fn computed_outputs_are_rejected() {
        let err = parse_str(
            r#"Exec(name = "x" command = "true" output = [Get("o")])"#,
            "flint",
            &Registry::with_builtins(),
        )
        .map(|_| ())
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { key, .. } if key == "output"));
    }

    #[test]
    fn clean_mode_removes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("out")).unwrap();
        fs::write(dir.path().join("out/x.txt"), "stale").unwrap();
        let mut settings = Settings::new(dir.path());
        settings.clean = true;
        let (context, targets) = declare_all(
            dir.path(),
            r#"Exec(name = "x" command = "exit 1" output = ["out/x.txt"])"#,
            settings,
        );
        targets[0].build(&context).unwrap();
        assert!(!dir.path().join("out/x.txt").exists());
        assert!(targets[0].last_command().is_none());
        assert!(context.gates().is_open(&dir.path().join("out/x.txt")));
    }
}
