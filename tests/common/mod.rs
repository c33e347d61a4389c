//! Common test utilities for tracesonar integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Path of a trace shipped in `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Write `contents` as `<dir>/<name>` and return its path.
#[allow(dead_code)]
pub fn write_trace(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("Failed to write trace");
    path
}

/// Run the tracesonar binary with the given arguments.
#[allow(dead_code)]
pub fn run_tracesonar(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tracesonar"))
        .args(args)
        .output()
        .expect("Failed to run tracesonar")
}
