// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The chat-API boundary (spec §6): the one trait every in-scope
//! component (dispatcher, access gate, control bot) depends on instead of
//! a concrete chat backend. `[fleet_common::telegram]` is the one shipped
//! binding; any other backend exposing these nine operations satisfies
//! this boundary equally (spec §1 "deliberately out of scope").

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A chat (conversation) id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// A user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// A sent-message id, returned by send/edit calls and referenced by
/// auto-refresh and callback handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

/// A reference to a remotely-stored file (voice note, photo, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub file_id: String,
}

/// Media kind classification for inbound voice/audio messages (spec §4.5)
/// and outbound media fan-out (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Animation,
    Video,
    Voice,
    Audio,
    WebpDocument,
    Document,
}

impl MediaKind {
    /// Classify a filename by extension (spec §4.6 step 2).
    pub fn classify(filename: &str) -> Self {
        let ext = filename.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" => Self::Photo,
            "gif" => Self::Animation,
            "mp4" | "mov" | "webm" => Self::Video,
            "ogg" | "oga" => Self::Voice,
            "mp3" | "wav" | "flac" | "m4a" => Self::Audio,
            "webp" => Self::WebpDocument,
            _ => Self::Document,
        }
    }
}

/// A plain text or voice/audio message from a user.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub user_id: Option<UserId>,
    pub text: Option<String>,
    pub voice: Option<FileRef>,
    pub audio: Option<FileRef>,
}

/// An inline-keyboard callback from a user.
#[derive(Debug, Clone)]
pub struct CallbackQuery {
    pub id: String,
    pub chat_id: ChatId,
    pub user_id: Option<UserId>,
    pub message_id: Option<MessageId>,
    pub data: String,
}

/// Closed variant match over the inbound update kinds this system
/// consumes (spec §9 "exhaustive variant match" redesign — the dispatcher
/// never inspects a dynamic/untyped update).
#[derive(Debug, Clone)]
pub enum ChatUpdate {
    Message(IncomingMessage),
    CallbackQuery(CallbackQuery),
    Unknown,
}

/// `getMe` response subset needed for `BOT_INFO` IPC and admin display.
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub full_name: String,
    pub username: String,
}

/// A registered command menu entry (spec §6 "Startup menus").
#[derive(Debug, Clone)]
pub struct CommandMenuEntry {
    pub command: String,
    pub description: String,
}

/// The chat-API boundary. Object-safe so the dispatcher, access gate, and
/// control bot can hold a `Box<dyn ChatApi>`/`Arc<dyn ChatApi>` without
/// knowing the concrete backend.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn get_me(&self) -> anyhow::Result<BotInfo>;

    /// Long-poll the next batch of updates, blocking up to `timeout_secs`.
    /// Implementations track their own update offset internally.
    async fn next_updates(&self, timeout_secs: u64) -> anyhow::Result<Vec<ChatUpdate>>;

    async fn send_message(&self, chat_id: ChatId, text: &str) -> anyhow::Result<MessageId>;

    async fn send_photo(&self, chat_id: ChatId, path: &Path, caption: &str) -> anyhow::Result<MessageId>;
    async fn send_animation(&self, chat_id: ChatId, path: &Path, caption: &str) -> anyhow::Result<MessageId>;
    async fn send_video(&self, chat_id: ChatId, path: &Path, caption: &str) -> anyhow::Result<MessageId>;
    async fn send_voice(&self, chat_id: ChatId, path: &Path, caption: &str) -> anyhow::Result<MessageId>;
    async fn send_audio(&self, chat_id: ChatId, path: &Path, caption: &str) -> anyhow::Result<MessageId>;
    async fn send_document(&self, chat_id: ChatId, path: &Path, caption: &str) -> anyhow::Result<MessageId>;

    async fn edit_message_media(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        path: &Path,
    ) -> anyhow::Result<()>;
    async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> anyhow::Result<()>;
    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> anyhow::Result<()>;

    async fn answer_callback_query(&self, callback_id: &str, text: &str) -> anyhow::Result<()>;

    /// Resolve a file id to a downloadable URL.
    async fn get_file_url(&self, file_id: &str) -> anyhow::Result<String>;

    async fn set_my_commands(&self, commands: &[CommandMenuEntry]) -> anyhow::Result<()>;
}

/// The two fixed command sets toggled on session open/close (spec §6).
pub fn no_session_commands() -> Vec<CommandMenuEntry> {
    [
        ("copilot", "Start a Copilot CLI session"),
        ("claude", "Start a Claude CLI session"),
        ("gemini", "Start a Gemini CLI session"),
        ("xterm", "Start a plain shell session"),
    ]
    .into_iter()
    .map(|(command, description)| CommandMenuEntry { command: command.into(), description: description.into() })
    .collect()
}

pub fn session_commands() -> Vec<CommandMenuEntry> {
    [
        ("close", "Close the current session"),
        ("screen", "Refresh the screenshot"),
        ("urls", "List discovered URLs"),
        ("tab", "Send Tab"),
        ("enter", "Send Enter"),
        ("esc", "Send Escape"),
    ]
    .into_iter()
    .map(|(command, description)| CommandMenuEntry { command: command.into(), description: description.into() })
    .collect()
}

#[cfg(test)]
#[path = "chat_tests.rs"]
mod tests;
