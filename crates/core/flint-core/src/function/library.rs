//! `Library`: an external file kept in the shared libraries directory.

use std::fs;
use std::path::{Path, PathBuf};

use super::{FILE, Function, LOCATION, NAME};
use crate::command::quote;
use crate::context::{DeclareCx, ExecCx};
use crate::error::{Error, Result};
use crate::expr::{Expr, Params};

/// `Library(name = "junit" file = "junit-4.12.jar" location = "https://..")`.
///
/// The file lives in the configured libraries directory. If it is missing and
/// a location is given, it is downloaded from `location` + `file` with curl.
/// The property `name` holds the absolute path.
#[derive(Debug)]
pub struct Library {
    name: String,
    file: String,
    location: Option<Expr>,
    path: PathBuf,
}

impl Library {
    /// Build from `name`, `file`, and an optional `location`.
    pub fn create(mut params: Params) -> Result<Self> {
        let name = params.take_literal(NAME)?;
        let file = params.take_literal(FILE)?;
        let location = params.take_optional(LOCATION);
        params.finish()?;
        Ok(Self {
            name,
            file,
            location,
            path: PathBuf::new(),
        })
    }

    fn download(&self, cx: &ExecCx<'_>) -> Result<()> {
        let Some(location) = &self.location else {
            return Err(Error::MissingFile {
                path: self.path.clone(),
            });
        };
        let url = format!("{}{}", location.resolve(cx)?, self.file);
        log::info!("Downloading {url}");
        cx.run_command(&download_script(&url, &self.path))?;
        Ok(())
    }
}

fn download_script(url: &str, path: &Path) -> String {
    format!(
        "curl -fsSL {} -o {}",
        quote(url),
        quote(&path.display().to_string())
    )
}

impl Function for Library {
    fn target_name(&self) -> String {
        format!("Library:{}", self.name)
    }

    fn declare(&mut self, cx: &mut DeclareCx<'_>) -> Result<()> {
        if let Some(location) = &mut self.location {
            location.declare(cx)?;
        }
        let directory = cx.resolve_path(&cx.settings().libraries);
        fs::create_dir_all(&directory).map_err(|e| Error::io("create", &directory, e))?;
        self.path = directory.join(&self.file);
        cx.set_property(self.name.as_str(), self.path.display().to_string());
        cx.add_output(&self.path)
    }

    fn resolve(&self, cx: &ExecCx<'_>) -> Result<String> {
        let path = self.path.display().to_string();
        if cx.is_cleaning() {
            cx.release_file(&self.path)?;
            return Ok(path);
        }
        if !self.path.exists() {
            self.download(cx)?;
        }
        cx.provide_file(&self.path)?;
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

    use super::download_script;

    fn context_with_libraries(libraries: &std::path::Path) -> Context {
        let mut settings = Settings::new(".");
        settings.libraries = libraries.to_path_buf();
        Context::new(settings)
    }

    #[test]
    fn existing_library_is_provided() {
        let libs = tempfile::tempdir().unwrap();
        fs::write(libs.path().join("dep.jar"), "jar").unwrap();
        let context = context_with_libraries(libs.path());
        let mut targets = parse_str(
            r#"Library(name = "dep" file = "dep.jar")"#,
            "flint",
            &Registry::with_builtins(),
        )
        .unwrap();
        targets[0].declare(&context).unwrap();
        let path = libs.path().join("dep.jar");
        assert!(!context.gates().is_open(&path));
        assert_eq!(
            context.properties().get("dep").unwrap(),
            path.display().to_string()
        );

        targets[0].build(&context).unwrap();
        assert!(context.gates().is_open(&path));
        assert_eq!(targets[0].name(), "Library:dep");
    }

    #[test]
    fn missing_library_without_location_fails() {
        let libs = tempfile::tempdir().unwrap();
        let context = context_with_libraries(libs.path());
        let mut targets = parse_str(
            r#"Library(name = "dep" file = "absent.jar")"#,
            "flint",
            &Registry::with_builtins(),
        )
        .unwrap();
        targets[0].declare(&context).unwrap();
        assert!(matches!(
            targets[0].build(&context),
            Err(Error::MissingFile { .. })
        ));
    }

    #[test]
    fn download_arguments_are_quoted() {
        let script = download_script(
            "https://host/it's/dep.jar",
            std::path::Path::new("/libs/o'neil.jar"),
        );
        assert_eq!(
            script,
            r"curl -fsSL 'https://host/it'\''s/dep.jar' -o '/libs/o'\''neil.jar'"
        );
    }

    #[test]
    fn clean_mode_only_releases() {
        let libs = tempfile::tempdir().unwrap();
        let mut settings = Settings::new(".");
        settings.libraries = libs.path().to_path_buf();
        settings.clean = true;
        let context = Context::new(settings);
        let mut targets = parse_str(
            r#"Library(name = "dep" file = "absent.jar" location = "https://invalid.example/")"#,
            "flint",
            &Registry::with_builtins(),
        )
        .unwrap();
        targets[0].declare(&context).unwrap();
        targets[0].build(&context).unwrap();
        assert!(targets[0].last_command().is_none());
        assert!(context.gates().is_open(&libs.path().join("absent.jar")));
    }
}
