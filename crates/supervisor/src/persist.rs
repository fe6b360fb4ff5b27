// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration Persistence for Admin Ops (spec §4.9): `addbot` /
//! `removebot` / `reload` rewrite the same dotenv-style file the
//! supervisor was started with, preserving key order and any unknown
//! key verbatim. Writes are atomic (tempfile + rename).

use std::path::Path;

/// An ordered `KEY=VALUE` file. Order and unrecognised keys are
/// preserved so hand-edited comments-adjacent settings survive a
/// supervisor-driven rewrite undisturbed in position (comments
/// themselves are not represented and are dropped on save).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    entries: Vec<(String, String)>,
}

impl EnvFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a dotenv-style file. Blank lines and `#`-comments are
    /// skipped; malformed lines (no `=`) are skipped as well.
    pub fn parse(contents: &str) -> Self {
        let mut entries = Vec::new();
        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else { continue };
            entries.push((key.trim().to_string(), unquote(value.trim())));
        }
        Self { entries }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::parse(&contents))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Set `key` to `value`, appending it if new, overwriting it in
    /// place (preserving position) if it already exists.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key.to_string(), value));
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    /// Render back to `KEY=VALUE\n` lines, in stored order.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(&quote_if_needed(value));
            out.push('\n');
        }
        out
    }

    /// Write atomically: a tempfile in the same directory, then a
    /// rename over `path` (spec §4.9: "write-temp + rename").
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        use std::io::Write;
        tmp.write_all(self.render().as_bytes())?;
        tmp.persist(path)?;
        Ok(())
    }
}

fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 && (bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"') {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

fn quote_if_needed(value: &str) -> String {
    if value.is_empty() || value.chars().any(|c| c.is_whitespace() || c == '#') {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

/// Apply `tokens` (ordered, comma-joined) to `TELEGRAM_BOT_TOKENS` and
/// persist, used by `/addbot`/`/removebot` (spec §4.9).
pub fn persist_tokens(path: &Path, tokens: &[String]) -> anyhow::Result<()> {
    let mut file = EnvFile::load(path).unwrap_or_default();
    file.set("TELEGRAM_BOT_TOKENS", tokens.join(","));
    file.save(path)
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
