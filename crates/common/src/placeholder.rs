// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Placeholder substitution for outbound terminal input (spec §4.3).
//!
//! Deterministic expansion order per the redesign flag in spec §9:
//! `[mN]` placeholders expand first, then `[media]`. Empty `[mN]`
//! placeholders (unconfigured) are left literal.

/// Expand `[m0]`..`[m9]` and `[media]` placeholders in `text`.
///
/// `lookup_m` resolves an `[mN]` index (0..=9) to its configured
/// replacement, if any. `media_dir` is the per-bot media directory path
/// substituted for `[media]`.
pub fn substitute<F>(text: &str, lookup_m: F, media_dir: &str) -> String
where
    F: Fn(u8) -> Option<String>,
{
    let after_m = substitute_m(text, lookup_m);
    substitute_media(&after_m, media_dir)
}

fn substitute_m<F>(text: &str, lookup_m: F) -> String
where
    F: Fn(u8) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' && i + 3 < bytes.len() && bytes[i + 1] == b'm' && bytes[i + 3] == b']'
        {
            let digit = bytes[i + 2];
            if digit.is_ascii_digit() {
                let n = digit - b'0';
                match lookup_m(n) {
                    Some(value) if !value.is_empty() => {
                        out.push_str(&value);
                        i += 4;
                        continue;
                    }
                    _ => {
                        // Unconfigured or empty: leave the placeholder literal.
                    }
                }
            }
        }
        // Safe: text is valid UTF-8 and we only branch into the ASCII
        // `[mN]` pattern above, so we can always advance by one char.
        let ch_len = text[i..].chars().next().map(|c| c.len_utf8()).unwrap_or(1);
        out.push_str(&text[i..i + ch_len]);
        i += ch_len;
    }
    out
}

fn substitute_media(text: &str, media_dir: &str) -> String {
    text.replace("[media]", media_dir)
}

#[cfg(test)]
#[path = "placeholder_tests.rs"]
mod tests;
