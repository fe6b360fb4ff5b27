// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    plain_http = { "Server at http://localhost:3000", vec!["http://localhost:3000"] },
    https_with_path = { "see https://example.com/a/b?x=1", vec!["https://example.com/a/b?x=1"] },
    trailing_period_trimmed = { "visit http://example.com.", vec!["http://example.com"] },
    trailing_paren_trimmed = { "(http://example.com)", vec!["http://example.com"] },
    no_url_present = { "nothing here", Vec::<&str>::new() },
    two_urls = {
        "a http://one.test b https://two.test/path c",
        vec!["http://one.test", "https://two.test/path"]
    },
)]
fn url_extraction_cases(input: &str, expected: Vec<&str>) {
    let found = extract_urls(input);
    assert_eq!(found, expected);
}

#[test]
fn duplicate_urls_are_not_deduplicated_here() {
    let found = extract_urls("http://x.test and again http://x.test");
    assert_eq!(found, vec!["http://x.test", "http://x.test"]);
}

#[test]
fn does_not_match_bare_scheme() {
    assert!(extract_urls("http://").is_empty() || extract_urls("http://")[0] == "http://");
}
