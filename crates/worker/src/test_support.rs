// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared in-memory [`ChatApi`] fake for worker-crate unit tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use fleet_common::chat::{BotInfo, ChatApi, ChatId, ChatUpdate, CommandMenuEntry, MessageId};

/// One recorded call into [`FakeChatApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeChatCall {
    SendMessage(ChatId, String),
    SendPhoto(ChatId, PathBuf, String),
    EditMessageMedia(ChatId, MessageId),
    EditMessageText(ChatId, MessageId, String),
    DeleteMessage(ChatId, MessageId),
    AnswerCallbackQuery(String, String),
    SetMyCommands(usize),
}

/// A `ChatApi` that records every call and returns canned responses —
/// no network, no process boundary.
#[derive(Default)]
pub struct FakeChatApi {
    pub calls: Mutex<Vec<FakeChatCall>>,
    pub next_message_id: Mutex<i64>,
    pub fail_edit_message_media: Mutex<bool>,
}

impl FakeChatApi {
    pub fn new() -> Self {
        Self { calls: Mutex::new(Vec::new()), next_message_id: Mutex::new(1), fail_edit_message_media: Mutex::new(false) }
    }

    fn next_id(&self) -> MessageId {
        let mut next = self.next_message_id.lock().expect("lock");
        let id = *next;
        *next += 1;
        MessageId(id)
    }

    pub fn calls(&self) -> Vec<FakeChatCall> {
        self.calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ChatApi for FakeChatApi {
    async fn get_me(&self) -> anyhow::Result<BotInfo> {
        Ok(BotInfo { full_name: "Fake Bot".into(), username: "fake_bot".into() })
    }

    async fn next_updates(&self, _timeout_secs: u64) -> anyhow::Result<Vec<ChatUpdate>> {
        Ok(Vec::new())
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> anyhow::Result<MessageId> {
        self.calls.lock().expect("lock").push(FakeChatCall::SendMessage(chat_id, text.to_string()));
        Ok(self.next_id())
    }

    async fn send_photo(&self, chat_id: ChatId, path: &Path, caption: &str) -> anyhow::Result<MessageId> {
        self.calls.lock().expect("lock").push(FakeChatCall::SendPhoto(chat_id, path.to_path_buf(), caption.to_string()));
        Ok(self.next_id())
    }

    async fn send_animation(&self, chat_id: ChatId, _path: &Path, _caption: &str) -> anyhow::Result<MessageId> {
        self.calls.lock().expect("lock").push(FakeChatCall::SendMessage(chat_id, "[animation]".into()));
        Ok(self.next_id())
    }

    async fn send_video(&self, chat_id: ChatId, _path: &Path, _caption: &str) -> anyhow::Result<MessageId> {
        self.calls.lock().expect("lock").push(FakeChatCall::SendMessage(chat_id, "[video]".into()));
        Ok(self.next_id())
    }

    async fn send_voice(&self, chat_id: ChatId, _path: &Path, _caption: &str) -> anyhow::Result<MessageId> {
        self.calls.lock().expect("lock").push(FakeChatCall::SendMessage(chat_id, "[voice]".into()));
        Ok(self.next_id())
    }

    async fn send_audio(&self, chat_id: ChatId, _path: &Path, _caption: &str) -> anyhow::Result<MessageId> {
        self.calls.lock().expect("lock").push(FakeChatCall::SendMessage(chat_id, "[audio]".into()));
        Ok(self.next_id())
    }

    async fn send_document(&self, chat_id: ChatId, _path: &Path, _caption: &str) -> anyhow::Result<MessageId> {
        self.calls.lock().expect("lock").push(FakeChatCall::SendMessage(chat_id, "[document]".into()));
        Ok(self.next_id())
    }

    async fn edit_message_media(&self, chat_id: ChatId, message_id: MessageId, _path: &Path) -> anyhow::Result<()> {
        if *self.fail_edit_message_media.lock().expect("lock") {
            anyhow::bail!("simulated editMessageMedia failure");
        }
        self.calls.lock().expect("lock").push(FakeChatCall::EditMessageMedia(chat_id, message_id));
        Ok(())
    }

    async fn edit_message_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> anyhow::Result<()> {
        self.calls.lock().expect("lock").push(FakeChatCall::EditMessageText(chat_id, message_id, text.to_string()));
        Ok(())
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> anyhow::Result<()> {
        self.calls.lock().expect("lock").push(FakeChatCall::DeleteMessage(chat_id, message_id));
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: &str) -> anyhow::Result<()> {
        self.calls.lock().expect("lock").push(FakeChatCall::AnswerCallbackQuery(callback_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn get_file_url(&self, file_id: &str) -> anyhow::Result<String> {
        Ok(format!("https://example.invalid/files/{file_id}"))
    }

    async fn set_my_commands(&self, commands: &[CommandMenuEntry]) -> anyhow::Result<()> {
        self.calls.lock().expect("lock").push(FakeChatCall::SetMyCommands(commands.len()));
        Ok(())
    }
}

