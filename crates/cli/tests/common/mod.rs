//! Helpers for driving the `snap` binary in a scratch directory

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `snap` with `args` inside `working_dir`
pub fn snap(working_dir: &Path, args: &[&str]) -> Result<CommandResult> {
    let output = Command::new(env!("CARGO_BIN_EXE_snap"))
        .args(args)
        .current_dir(working_dir)
        .env_remove("RUST_LOG")
        .output()
        .context("Failed to execute snap")?;

    Ok(CommandResult {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

/// Run and fail the test on a non-zero exit
pub fn snap_ok(working_dir: &Path, args: &[&str]) -> Result<CommandResult> {
    let result = snap(working_dir, args)?;
    if !result.success() {
        anyhow::bail!(
            "snap {:?} failed (exit code: {}):\nStdout: {}\nStderr: {}",
            args,
            result.exit_code,
            result.stdout,
            result.stderr
        );
    }
    Ok(result)
}

/// Snapshot IDs currently on disk, in no particular order
pub fn snapshot_ids(root: &Path) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(root.join(".snap/snapshots"))? {
        ids.push(entry?.file_name().to_string_lossy().to_string());
    }
    Ok(ids)
}

pub fn blob_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut blobs = Vec::new();
    for shard in std::fs::read_dir(root.join(".snap/storage"))? {
        for blob in std::fs::read_dir(shard?.path())? {
            blobs.push(blob?.path());
        }
    }
    Ok(blobs)
}
