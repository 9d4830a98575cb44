//! Integration tests for the flint binary.
//!
//! Each test writes a small project into a temp directory and runs the
//! compiled binary against it. `HOME` points into the temp directory so a
//! developer's own `~/.flint/config.toml` never leaks in.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (path, contents) in files {
        let path = dir.path().join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
    dir
}

fn flint(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_flint"))
        .args(args)
        .current_dir(dir)
        .env("HOME", dir)
        .env_remove("FLINT_LOG")
        .output()
        .expect("failed to execute flint")
}

fn describe(output: &Output) -> String {
    format!(
        "exit={:?}\nstdout:\n{}\nstderr:\n{}",
        output.status.code(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    )
}

#[test]
fn build_runs_producer_before_consumer() {
    let dir = project(&[(
        "flint",
        concat!(
            "Exec(name = \"y\" command = \"cat out/x.txt > out/y.txt\" input = [\"out/x.txt\"] output = [\"out/y.txt\"])\n",
            "Exec(name = \"x\" command = \"echo made > out/x.txt\" output = [\"out/x.txt\"])\n",
        ),
    )]);
    let output = flint(dir.path(), &["build"]);
    assert!(output.status.success(), "{}", describe(&output));
    assert_eq!(
        fs::read_to_string(dir.path().join("out/y.txt")).unwrap(),
        "made\n"
    );
}

#[test]
fn bare_invocation_builds_the_given_root() {
    let dir = project(&[(
        "proj/flint",
        r#"Exec(name = "t" command = "touch done.txt" output = ["done.txt"])"#,
    )]);
    let output = flint(dir.path(), &["proj"]);
    assert!(output.status.success(), "{}", describe(&output));
    assert!(dir.path().join("proj/done.txt").exists());
}

#[test]
fn failing_command_exits_non_zero() {
    let dir = project(&[(
        "flint",
        r#"Exec(name = "x" command = "exit 3" output = ["x.txt"])"#,
    )]);
    let output = flint(dir.path(), &["build", "-q"]);
    assert!(!output.status.success(), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("exit 3"), "{}", describe(&output));
}

#[test]
fn syntax_error_exits_non_zero_and_names_the_file() {
    let dir = project(&[("sub/flint", "Get(\"x\"")]);
    let output = flint(dir.path(), &["build"]);
    assert!(!output.status.success(), "{}", describe(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("sub/flint:1"), "{}", describe(&output));
}

#[test]
fn list_declares_without_running() {
    let dir = project(&[(
        "flint",
        concat!(
            "Set(name = \"k\" value = \"v\")\n",
            "Exec(name = \"x\" command = \"touch ran.txt\" output = [\"ran.txt\"])\n",
        ),
    )]);
    let output = flint(dir.path(), &["list"]);
    assert!(output.status.success(), "{}", describe(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Declaring 2 targets"), "{}", describe(&output));
    let names: Vec<&str> = stdout
        .lines()
        .filter_map(|line| line.split('\t').next())
        .collect();
    assert_eq!(names, vec!["Set:k", "x"]);
    assert!(!dir.path().join("ran.txt").exists());
}

#[test]
fn functions_lists_builtins() {
    let dir = tempfile::tempdir().unwrap();
    let output = flint(dir.path(), &["functions"]);
    assert!(output.status.success(), "{}", describe(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let names: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        names,
        vec![
            "Exec", "Find", "Get", "GetFile", "Library", "Platform", "Release", "Set", "SetFile",
        ]
    );
}

#[test]
fn clean_removes_outputs() {
    let dir = project(&[
        (
            "flint",
            r#"Exec(name = "x" command = "exit 1" output = ["out/x.txt"])"#,
        ),
        ("out/x.txt", "stale"),
    ]);
    let output = flint(dir.path(), &["clean"]);
    assert!(output.status.success(), "{}", describe(&output));
    assert!(!dir.path().join("out/x.txt").exists());
}

#[test]
fn defines_seed_properties() {
    let dir = project(&[(
        "flint",
        r#"Exec(name = "m" command = [["echo" Get("mode") "> mode.txt"]] output = ["mode.txt"])"#,
    )]);
    let output = flint(dir.path(), &["build", "-D", "mode=release"]);
    assert!(output.status.success(), "{}", describe(&output));
    assert_eq!(
        fs::read_to_string(dir.path().join("mode.txt")).unwrap(),
        "release\n"
    );
}

#[test]
fn config_file_seeds_properties() {
    let dir = project(&[
        (
            "flint",
            r#"Exec(name = "m" command = [["echo" Get("mode") "> mode.txt"]] output = ["mode.txt"])"#,
        ),
        (".flint/config.toml", "jobs = 2\n\n[properties]\nmode = \"debug\"\n"),
    ]);
    let output = flint(dir.path(), &["build"]);
    assert!(output.status.success(), "{}", describe(&output));
    assert_eq!(
        fs::read_to_string(dir.path().join("mode.txt")).unwrap(),
        "debug\n"
    );
}
