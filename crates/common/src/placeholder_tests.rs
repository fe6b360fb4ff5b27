// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn lookup(values: &'static [(u8, &'static str)]) -> impl Fn(u8) -> Option<String> {
    move |n| values.iter().find(|(k, _)| *k == n).map(|(_, v)| v.to_string())
}

#[test]
fn substitutes_media_placeholder() {
    let out = substitute("open [media]/file.txt", |_| None, "/data/bot-0");
    assert_eq!(out, "open /data/bot-0/file.txt");
}

#[test]
fn substitutes_m_placeholder() {
    let out = substitute("run [m0] now", lookup(&[(0, "echo hi")]), "/data");
    assert_eq!(out, "run echo hi now");
}

#[test]
fn unconfigured_m_placeholder_left_literal() {
    let out = substitute("run [m5] now", |_| None, "/data");
    assert_eq!(out, "run [m5] now");
}

#[test]
fn empty_m_placeholder_left_literal() {
    let out = substitute("run [m5] now", lookup(&[(5, "")]), "/data");
    assert_eq!(out, "run [m5] now");
}

#[test]
fn mn_expands_before_media_deterministic_order() {
    // m1 itself expands to a string containing "[media]" — per spec §9 the
    // [mN] pass runs first, so the [media] it introduces is *also* expanded.
    let out = substitute("go [m1]", lookup(&[(1, "cd [media]")]), "/data/bot-0");
    assert_eq!(out, "go cd /data/bot-0");
}

#[test]
fn no_placeholders_is_noop() {
    let out = substitute("plain text", |_| None, "/data");
    assert_eq!(out, "plain text");
}

#[test]
fn substitution_is_idempotent_without_reintroduced_placeholders() {
    let text = "echo [m2] [media]";
    let lookup_fn = lookup(&[(2, "value")]);
    let once = substitute(text, &lookup_fn, "/data/bot-0");
    let twice = substitute(&once, &lookup_fn, "/data/bot-0");
    assert_eq!(once, twice);
}

#[test]
fn handles_multibyte_text_around_placeholders() {
    let out = substitute("café [m0] ☕", lookup(&[(0, "tea")]), "/data");
    assert_eq!(out, "café tea ☕");
}
