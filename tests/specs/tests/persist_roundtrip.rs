// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exercises the real atomic-write path (spec §4.9: "write-temp + rename")
//! against the filesystem, not an in-memory stand-in.

use fleet_supervisor::persist::{persist_tokens, EnvFile};

#[test]
fn persist_tokens_survives_a_round_trip_through_a_real_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(".env");
    std::fs::write(&path, "ALLOWED_USER_IDS=1\nTELEGRAM_BOT_TOKENS=old-token\n").expect("seed file");

    persist_tokens(&path, &["t0".to_string(), "t1".to_string()]).expect("persist succeeds");

    let reloaded = EnvFile::load(&path).expect("reload succeeds");
    assert_eq!(reloaded.get("TELEGRAM_BOT_TOKENS"), Some("t0,t1"));
    assert_eq!(reloaded.get("ALLOWED_USER_IDS"), Some("1"));
}

#[test]
fn persist_tokens_creates_the_file_if_it_does_not_exist_yet() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(".env");

    persist_tokens(&path, &["fresh-token".to_string()]).expect("persist succeeds");

    let reloaded = EnvFile::load(&path).expect("reload succeeds");
    assert_eq!(reloaded.get("TELEGRAM_BOT_TOKENS"), Some("fresh-token"));
}
