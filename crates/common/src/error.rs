// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Closed error-code enum for the finite set of user-facing failure
//! categories the dispatcher can hit (spec §7), so handlers map a failure
//! to exactly one templated reply without string-matching.

use std::fmt;

/// User-facing failure categories. Every dispatcher handler catches its
/// own failures and maps them to one of these before replying; none may
/// unwind past the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    SessionNotFound,
    SessionExists,
    PtySpawnFailed,
    RenderFailed,
    ChatApiTransient,
    Unauthorized,
    Transcription(TranscriptionError),
    Internal,
}

/// Typed transcription failure subset (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptionError {
    NoKey,
    InvalidKey,
    UnsupportedFormat,
    FileTooLarge,
    RateLimited,
    QuotaExceeded,
    DownloadFailed,
    Generic,
}

impl ErrorCode {
    /// The short, templated user-facing message for this error.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::SessionNotFound => "No active session. Open one first.",
            Self::SessionExists => "A session is already open here.",
            Self::PtySpawnFailed => "Could not start a terminal session.",
            Self::RenderFailed => "Could not render the screen, try again.",
            Self::ChatApiTransient => "Temporary error, please retry.",
            Self::Unauthorized => "You are not authorised to use this bot.",
            Self::Transcription(t) => t.user_message(),
            Self::Internal => "Something went wrong.",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::SessionExists => "SESSION_EXISTS",
            Self::PtySpawnFailed => "PTY_SPAWN_FAILED",
            Self::RenderFailed => "RENDER_FAILED",
            Self::ChatApiTransient => "CHAT_API_TRANSIENT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Transcription(_) => "TRANSCRIPTION",
            Self::Internal => "INTERNAL",
        }
    }
}

impl TranscriptionError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NoKey => "Voice transcription is not configured.",
            Self::InvalidKey => "Voice transcription key is invalid.",
            Self::UnsupportedFormat => "Unsupported audio format.",
            Self::FileTooLarge => "Voice message is too large to transcribe.",
            Self::RateLimited => "Transcription service is rate-limited, try again shortly.",
            Self::QuotaExceeded => "Transcription quota exceeded.",
            Self::DownloadFailed => "Could not download the voice message.",
            Self::Generic => "Could not transcribe the voice message.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for ErrorCode {}

/// Truncate a callback-query answer to the chat API's ~200 char budget,
/// attempting a minimal fallback if even that would be rejected.
pub fn truncate_callback_answer(text: &str) -> String {
    const LIMIT: usize = 200;
    if text.chars().count() <= LIMIT {
        return text.to_string();
    }
    let truncated: String = text.chars().take(LIMIT.saturating_sub(1)).collect();
    if truncated.is_empty() {
        return "error".to_string();
    }
    format!("{truncated}\u{2026}")
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
