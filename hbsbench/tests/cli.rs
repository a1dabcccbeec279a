//! Tests that drive the `hbsbench` binary

use std::path::Path;
use std::process::Command;

fn hbsbench(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hbsbench"));
    cmd.current_dir(dir);
    cmd
}

fn corpus() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let templates = dir.path().join("templates");
    std::fs::create_dir_all(&templates).unwrap();
    std::fs::write(templates.join("a.hbs"), "hello {{name}}").unwrap();
    std::fs::write(templates.join("b.hbs"), "{{#each items}}{{this}}{{/each}}").unwrap();
    dir
}

#[test]
fn test_measure_writes_result_file() {
    let dir = corpus();
    let output = hbsbench(dir.path())
        .args(["measure", "handlebars-6", "out.txt"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let written = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
    let ms: f64 = written.trim().parse().unwrap();
    assert!(ms >= 0.0);
}

#[test]
fn test_measure_unknown_compiler_fails() {
    let dir = corpus();
    let output = hbsbench(dir.path())
        .args(["measure", "handlebars-0", "out.txt"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(!dir.path().join("out.txt").exists());
}

#[test]
fn test_isolated_run_prints_table() {
    let dir = corpus();
    let output = hbsbench(dir.path())
        .args(["run", "handlebars-6$", "-n", "2", "--isolation", "process"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("| variant | average | min | max |"));
    assert!(stdout.contains("| handlebars-6 |"));
    assert!(stdout.contains("| hbs-compiler-handlebars-6 |"));

    let data = dir.path().join("data");
    let run_dirs: Vec<_> = std::fs::read_dir(&data).unwrap().collect();
    assert_eq!(run_dirs.len(), 1);
    let run_dir = run_dirs[0].as_ref().unwrap().path();
    assert!(run_dir.join("handlebars-6-0.txt").is_file());
    assert!(run_dir.join("handlebars-6-1.txt").is_file());
}

#[test]
fn test_in_process_lines_format() {
    let dir = corpus();
    let output = hbsbench(dir.path())
        .args([
            "^handlebars-6$",
            "-n",
            "1",
            "--isolation",
            "in-process",
            "--format",
            "lines",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("Average total precompile time using handlebars-6 "));
}

#[test]
fn test_no_matching_compilers() {
    let dir = corpus();
    let output = hbsbench(dir.path()).args(["run", "^nothing$"]).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No compilers found."));
}

#[test]
fn test_init_writes_config() {
    let dir = tempfile::tempdir().unwrap();
    let first = hbsbench(dir.path()).arg("init").output().unwrap();
    assert!(first.status.success());
    assert!(dir.path().join("hbsbench.toml").is_file());

    let second = hbsbench(dir.path()).arg("init").output().unwrap();
    assert!(!second.status.success());
}
