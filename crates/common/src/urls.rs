// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! URL extraction for the output-stream analyser (spec §4.3).
//!
//! Per the redesign flag in spec §9, ANSI is stripped (see
//! [`crate::screen::strip_ansi`]) before this regex runs, so noise from
//! escape sequences can never produce a spurious match.

use std::sync::LazyLock;

use regex::Regex;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"https?://[A-Za-z0-9.\-]+(?::\d+)?(?:/[A-Za-z0-9._~!$&'()*+,;=:@%/\-]*)?").unwrap()
});

/// Find all well-formed `http(s)://` URLs in already ANSI-stripped `text`,
/// in order of first appearance, without deduplicating.
pub fn extract_urls(text: &str) -> Vec<String> {
    URL_RE.find_iter(text).map(|m| m.as_str().trim_end_matches(['.', ',', ')']).to_string()).collect()
}

#[cfg(test)]
#[path = "urls_tests.rs"]
mod tests;
