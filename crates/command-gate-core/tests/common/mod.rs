// crates/command-gate-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Fake kubectl executables for process-level tests.
// Purpose: Exercise the real runner against scripted programs.
// Dependencies: tempfile
// ============================================================================

//! ## Overview
//! Writes small `sh` scripts that stand in for kubectl so integration tests
//! can drive real child processes without a cluster.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use tempfile::TempDir;

/// A scripted executable living in its own temporary directory.
pub struct FakeKubectl {
    /// Owning directory; removed on drop.
    pub dir: TempDir,
    /// Path to the executable script.
    pub path: PathBuf,
}

impl FakeKubectl {
    /// Writes `body` as an executable `sh` script named `kubectl`.
    pub fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kubectl");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(&path, permissions).unwrap();
        Self {
            dir,
            path,
        }
    }

    /// Returns the script path as a program string.
    pub fn program(&self) -> String {
        self.path.display().to_string()
    }

    /// Returns the path of the argument log written by [`Self::recording`].
    pub fn call_log(&self) -> PathBuf {
        self.dir.path().join("calls.log")
    }

    /// Script that appends its arguments to `calls.log`, then runs `body`.
    pub fn recording(body: &str) -> Self {
        let script = format!("echo \"$*\" >> \"$(dirname \"$0\")/calls.log\"\n{body}");
        Self::new(&script)
    }

    /// Returns the recorded argument lines.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.call_log())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}
