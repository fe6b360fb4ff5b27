// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parse_skips_blank_lines_and_comments() {
    let file = EnvFile::parse("\n# a comment\nFOO=bar\n\nBAZ=qux\n");
    assert_eq!(file.get("FOO"), Some("bar"));
    assert_eq!(file.get("BAZ"), Some("qux"));
    assert_eq!(file.get("# a comment"), None);
}

#[test]
fn parse_strips_surrounding_quotes() {
    let file = EnvFile::parse("NAME=\"hello world\"\n");
    assert_eq!(file.get("NAME"), Some("hello world"));
}

#[test]
fn set_preserves_position_of_existing_key() {
    let mut file = EnvFile::parse("A=1\nB=2\nC=3\n");
    file.set("B", "22");
    assert_eq!(file.render(), "A=1\nB=22\nC=3\n");
}

#[test]
fn set_appends_new_keys_at_the_end() {
    let mut file = EnvFile::parse("A=1\n");
    file.set("Z", "9");
    assert_eq!(file.render(), "A=1\nZ=9\n");
}

#[test]
fn remove_drops_the_entry_without_disturbing_order() {
    let mut file = EnvFile::parse("A=1\nB=2\nC=3\n");
    file.remove("B");
    assert_eq!(file.render(), "A=1\nC=3\n");
}

#[test]
fn unknown_non_token_keys_survive_a_roundtrip() {
    let mut file = EnvFile::parse("TELEGRAM_BOT_TOKENS=t0,t1\nCUSTOM_FLAG=on\n");
    file.set("TELEGRAM_BOT_TOKENS", "t0,t1,t2");
    assert_eq!(file.get("CUSTOM_FLAG"), Some("on"));
    assert_eq!(file.render(), "TELEGRAM_BOT_TOKENS=t0,t1,t2\nCUSTOM_FLAG=on\n");
}

#[test]
fn save_then_load_is_atomic_and_round_trips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(".env");
    let mut file = EnvFile::new();
    file.set("TELEGRAM_BOT_TOKENS", "abc,def");
    file.set("ALLOWED_USER_IDS", "1,2,3");
    file.save(&path).expect("save");

    let loaded = EnvFile::load(&path).expect("load");
    assert_eq!(loaded.get("TELEGRAM_BOT_TOKENS"), Some("abc,def"));
    assert_eq!(loaded.get("ALLOWED_USER_IDS"), Some("1,2,3"));
}

#[test]
fn persist_tokens_updates_token_key_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(".env");
    std::fs::write(&path, "TELEGRAM_BOT_TOKENS=old\nLOG_LEVEL=info\n").expect("write");

    persist_tokens(&path, &["new0".to_string(), "new1".to_string()]).expect("persist");

    let loaded = EnvFile::load(&path).expect("load");
    assert_eq!(loaded.get("TELEGRAM_BOT_TOKENS"), Some("new0,new1"));
    assert_eq!(loaded.get("LOG_LEVEL"), Some("info"));
}
