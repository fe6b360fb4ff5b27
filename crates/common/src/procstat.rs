// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Self-process resident memory, for the `HEALTH_RESPONSE` IPC payload
//! (spec §3 `IPCMessage`). Linux-only `/proc` read; returns `0` anywhere
//! the file isn't available rather than failing the health check.

/// Resident set size of the current process, in bytes.
pub fn resident_memory_bytes() -> u64 {
    let Ok(statm) = std::fs::read_to_string("/proc/self/statm") else {
        return 0;
    };
    let Some(rss_pages) = statm.split_whitespace().nth(1) else {
        return 0;
    };
    let Ok(rss_pages) = rss_pages.parse::<u64>() else {
        return 0;
    };
    rss_pages.saturating_mul(page_size_bytes())
}

fn page_size_bytes() -> u64 {
    // SAFETY: sysconf(_SC_PAGESIZE) takes no pointers and always returns a
    // small positive value on Linux; a negative result is mapped to a
    // reasonable default instead of propagated.
    #[allow(unsafe_code)]
    let size = unsafe { nix::libc::sysconf(nix::libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        4096
    }
}

#[cfg(test)]
#[path = "procstat_tests.rs"]
mod tests;
