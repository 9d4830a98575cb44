//! Functions that hand files between targets: `SetFile`, `GetFile`, `Find`.

use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use super::property::literal_key;
use super::{ANONYMOUS, DIRECTORY, Function, NAME, PATTERN, VALUE};
use crate::context::{DeclareCx, ExecCx};
use crate::error::{Error, Result};
use crate::expr::Params;

/// `SetFile(name = "key" value = "path")` publishes an existing file.
///
/// The property holds the file's absolute path, so any target can await it
/// through `GetFile`.
#[derive(Debug)]
pub struct SetFile {
    key: String,
    value: String,
    path: Option<PathBuf>,
}

impl SetFile {
    /// Build from `name` and `value`.
    pub fn create(mut params: Params) -> Result<Self> {
        let key = params.take_literal(NAME)?;
        let value = params.take_literal(VALUE)?;
        params.finish()?;
        Ok(Self {
            key,
            value,
            path: None,
        })
    }
}

impl Function for SetFile {
    fn target_name(&self) -> String {
        format!("SetFile:{}", self.key)
    }

    fn declare(&mut self, cx: &mut DeclareCx<'_>) -> Result<()> {
        let path = cx.resolve_path(&self.value);
        if !path.is_file() {
            return Err(Error::MissingFile { path });
        }
        cx.add_existing(&path)?;
        cx.set_property(self.key.as_str(), path.display().to_string());
        self.path = Some(path);
        Ok(())
    }

    fn resolve(&self, cx: &ExecCx<'_>) -> Result<String> {
        match &self.path {
            Some(path) => Ok(path.display().to_string()),
            None => Ok(cx.resolve_path(&self.value).display().to_string()),
        }
    }
}

/// `GetFile("key")` reads a property holding a path and waits for that file.
#[derive(Debug)]
pub struct GetFile {
    key: String,
}

impl GetFile {
    /// Build from `name` or the anonymous parameter.
    pub fn create(mut params: Params) -> Result<Self> {
        let key = literal_key(&mut params)?;
        params.finish()?;
        Ok(Self { key })
    }
}

impl Function for GetFile {
    fn target_name(&self) -> String {
        format!("GetFile:{}", self.key)
    }

    fn resolve(&self, cx: &ExecCx<'_>) -> Result<String> {
        let path = cx.property(&self.key)?;
        cx.await_file(&path)?;
        Ok(path)
    }
}

/// `Find(directory = "src" pattern = ".*\.c")` lists files under a directory.
///
/// A file matches when the pattern matches its name or its path relative to
/// the target directory. Matching happens once, at declare time; resolving
/// awaits every match and returns the relative paths in sorted order.
#[derive(Debug)]
pub struct Find {
    directory: String,
    pattern: Option<String>,
    regex: Regex,
    files: Vec<String>,
}

impl Find {
    /// Build from `directory` (or the anonymous parameter) and an optional `pattern`.
    pub fn create(mut params: Params) -> Result<Self> {
        let (directory, pattern) = if params.has(DIRECTORY) {
            (
                params.take_literal(DIRECTORY)?,
                params.take_optional_literal(PATTERN)?,
            )
        } else {
            (params.take_literal(ANONYMOUS)?, None)
        };
        params.finish()?;
        let source = pattern.as_deref().unwrap_or(".*");
        let regex = Regex::new(&format!("^(?:{source})$")).map_err(|source_err| Error::Pattern {
            pattern: source.to_string(),
            source: source_err,
        })?;
        Ok(Self {
            directory,
            pattern,
            regex,
            files: Vec::new(),
        })
    }

    fn prefix(&self, base: &Path, directory: &Path) -> String {
        match base.strip_prefix(directory) {
            Ok(relative) => to_slashes(relative),
            Err(_) => self.directory.trim_end_matches('/').to_string(),
        }
    }
}

impl Function for Find {
    fn target_name(&self) -> String {
        format!(
            "Find:{} {}",
            self.pattern.as_deref().unwrap_or(".*"),
            self.directory
        )
    }

    fn declare(&mut self, cx: &mut DeclareCx<'_>) -> Result<()> {
        let base = cx.resolve_path(&self.directory);
        let prefix = self.prefix(&base, cx.directory());
        let mut files = Vec::new();
        for entry in WalkDir::new(&base).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::io("search", &base, e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&base).unwrap_or(entry.path());
            let full = if prefix.is_empty() {
                to_slashes(relative)
            } else {
                format!("{prefix}/{}", to_slashes(relative))
            };
            let name = entry.file_name().to_string_lossy();
            if self.regex.is_match(&name) || self.regex.is_match(&full) {
                files.push(full);
            }
        }
        files.sort();
        log::debug!("{} matched {} files", self.target_name(), files.len());
        self.files = files;
        Ok(())
    }

    fn resolve(&self, cx: &ExecCx<'_>) -> Result<String> {
        Ok(self.resolve_list(cx)?.join(" "))
    }

    fn resolve_list(&self, cx: &ExecCx<'_>) -> Result<Vec<String>> {
        for file in &self.files {
            cx.await_file(file)?;
        }
        Ok(self.files.clone())
    }
}

fn to_slashes(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
