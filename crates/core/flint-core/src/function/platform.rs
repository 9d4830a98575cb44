//! `Platform`: pick a branch by host operating system.

use std::env::consts::OS;

use super::{Function, LINUX, MAC, WINDOWS};
use crate::context::{DeclareCx, ExecCx};
use crate::error::{Error, Result};
use crate::expr::{Expr, Params};

/// `Platform(linux = .. mac = .. windows = ..)`.
///
/// Only the branch for the running system is required; the others are
/// parsed but never declared or resolved.
#[derive(Debug)]
pub struct Platform {
    branch: Expr,
}

impl Platform {
    /// Keep the branch for the running OS and drop the others.
    pub fn create(mut params: Params) -> Result<Self> {
        let key = branch_key(OS)?;
        let branch = params.take(key)?;
        for other in [LINUX, MAC, WINDOWS] {
            params.take_optional(other);
        }
        params.finish()?;
        Ok(Self { branch })
    }
}

fn branch_key(os: &str) -> Result<&'static str> {
    match os {
        "linux" => Ok(LINUX),
        "macos" => Ok(MAC),
        "windows" => Ok(WINDOWS),
        other => Err(Error::UnsupportedPlatform {
            os: other.to_string(),
        }),
    }
}

impl Function for Platform {
    fn target_name(&self) -> String {
        "Platform".into()
    }

    fn declare(&mut self, cx: &mut DeclareCx<'_>) -> Result<()> {
        self.branch.declare(cx)
    }

    fn resolve(&self, cx: &ExecCx<'_>) -> Result<String> {
        self.branch.resolve(cx)
    }

    fn resolve_list(&self, cx: &ExecCx<'_>) -> Result<Vec<String>> {
        self.branch.resolve_list(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::function::Registry;
    use crate::settings::Settings;
    use crate::syntax::parser::parse_str;

    #[test]
    fn keys_for_known_systems() {
        assert_eq!(branch_key("linux").unwrap(), LINUX);
        assert_eq!(branch_key("macos").unwrap(), MAC);
        assert_eq!(branch_key("windows").unwrap(), WINDOWS);
        assert!(matches!(
            branch_key("plan9"),
            Err(Error::UnsupportedPlatform { os }) if os == "plan9"
        ));
    }

    #[test]
    fn picks_the_running_branch() {
        let context = Context::new(Settings::new("."));
        let mut targets = parse_str(
            r#"Platform(linux = ["l" "x"] mac = "m" windows = "w")"#,
            "flint",
            &Registry::with_builtins(),
        )
        .unwrap();
        targets[0].declare(&context).unwrap();
        targets[0].build(&context).unwrap();
        let expected = match OS {
            "linux" => "l x",
            "macos" => "m",
            _ => "w",
        };
        assert_eq!(targets[0].value(), Some(expected));
    }

    #[test]
    fn other_branches_are_optional() {
        let src = format!(r#"Platform({} = "only")"#, branch_key(OS).unwrap());
        assert!(parse_str(&src, "flint", &Registry::with_builtins()).is_ok());
    }
}
