//! Shell command runner for build steps.
//!
//! Wraps `std::process::Command` around `sh -c <script>`. Output is read
//! line by line on helper threads so the child never blocks on a full pipe,
//! and the child is polled so a cancelled build can kill it.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; `-1` if the process was killed by a signal.
    pub status: i32,
    /// Stdout, one entry per line.
    pub stdout: Vec<String>,
    /// Stderr, one entry per line.
    pub stderr: Vec<String>,
}

impl CommandOutput {
    /// Returns `true` on exit status 0.
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// A builder for one shell invocation.
pub struct ShellCommand {
    cmd: Command,
    script: String,
}

impl ShellCommand {
    /// Prepare `script` to run under `sh -c`.
    pub fn new(script: impl Into<String>) -> Self {
        let script = script.into();
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&script);
        Self { cmd, script }
    }

    /// Set the working directory.
    pub fn current_dir(&mut self, dir: &Path) -> &mut Self {
        self.cmd.current_dir(dir);
        self
    }

    /// Run to completion, killing the child if `is_cancelled` turns true.
    ///
    /// Each stdout line is logged at info level and each stderr line at
    /// debug level as it arrives.
    pub fn run(&mut self, is_cancelled: impl Fn() -> bool) -> Result<CommandOutput> {
        log::debug!("$ {}", self.script);
        let mut child = self
            .cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                command: self.script.clone(),
                source,
            })?;

        let stdout = child.stdout.take().map(|out| {
            thread::spawn(move || collect_lines(out, |line| log::info!("{line}")))
        });
        let stderr = child.stderr.take().map(|err| {
            thread::spawn(move || collect_lines(err, |line| log::debug!("{line}")))
        });

        // On error the readers are detached: a killed shell's children may
        // still hold the pipes open.
        let status = wait(&mut child, &self.script, &is_cancelled)?;
        Ok(CommandOutput {
            status,
            stdout: stdout.map(join_lines).unwrap_or_default(),
            stderr: stderr.map(join_lines).unwrap_or_default(),
        })
    }

    /// Run and fail with [`Error::CommandFailed`] on a non-zero exit.
    pub fn run_checked(&mut self, is_cancelled: impl Fn() -> bool) -> Result<CommandOutput> {
        let output = self.run(is_cancelled)?;
        if !output.success() {
            return Err(Error::CommandFailed {
                command: self.script.clone(),
                status: output.status,
                stderr: output.stderr.join("\n"),
            });
        }
        Ok(output)
    }
}

/// Quote `arg` as a single word for `sh`.
pub fn quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

fn wait(child: &mut Child, script: &str, is_cancelled: &impl Fn() -> bool) -> Result<i32> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status.code().unwrap_or(-1)),
            Ok(None) => {}
            Err(source) => {
                return Err(Error::Spawn {
                    command: script.to_string(),
                    source,
                });
            }
        }
        if is_cancelled() {
            log::debug!("killing `{script}`");
            // The child may exit between the poll and the kill.
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Cancelled);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn collect_lines(stream: impl Read, echo: impl Fn(&str)) -> Vec<String> {
    BufReader::new(stream)
        .lines()
        .map_while(std::result::Result::ok)
        .inspect(|line| echo(line))
        .collect()
}

fn join_lines(handle: thread::JoinHandle<Vec<String>>) -> Vec<String> {
    handle.join().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    fn never() -> bool {
        false
    }

    #[test]
    fn captures_both_streams() {
        let output = ShellCommand::new("echo one; echo two; echo oops >&2")
            .run(never)
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, vec!["one", "two"]);
        assert_eq!(output.stderr, vec!["oops"]);
    }

    #[test]
    fn runs_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let output = ShellCommand::new("pwd")
            .current_dir(dir.path())
            .run(never)
            .unwrap();
        let pwd = Path::new(&output.stdout[0]).canonicalize().unwrap();
        assert_eq!(pwd, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn quoted_words_survive_the_shell() {
        assert_eq!(quote("plain"), "'plain'");
        assert_eq!(quote("it's"), r"'it'\''s'");
        let script = format!("printf '%s\\n' {} {}", quote("it's here"), quote("$HOME `x`"));
        let output = ShellCommand::new(script).run(never).unwrap();
        assert_eq!(output.stdout, vec!["it's here", "$HOME `x`"]);
    }

    #[test]
    fn non_zero_exit_is_reported() {
        let err = ShellCommand::new("echo bad >&2; exit 3")
            .run_checked(never)
            .unwrap_err();
        match err {
            Error::CommandFailed {
                command,
                status,
                stderr,
            } => {
                assert_eq!(command, "echo bad >&2; exit 3");
                assert_eq!(status, 3);
                assert_eq!(stderr, "bad");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cancellation_kills_the_child() {
        let flag = AtomicBool::new(false);
        let start = Instant::now();
        thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(100));
                flag.store(true, Ordering::SeqCst);
            });
            let err = ShellCommand::new("sleep 10")
                .run(|| flag.load(Ordering::SeqCst))
                .unwrap_err();
            assert!(err.is_cancelled());
        });
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
