// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration-test support: locates the compiled `fake-worker` fixture so
//! supervisor tests can fork a real process and exercise the real IPC
//! pipes, without a live chat backend.

use std::path::{Path, PathBuf};

/// Resolve the path to the compiled `fake-worker` fixture binary.
pub fn fake_worker_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs -> tests -> workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("fake-worker")
}
