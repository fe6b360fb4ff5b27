// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared in-memory [`ChatApi`] fake for supervisor-crate unit tests.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use fleet_common::chat::{BotInfo, ChatApi, ChatId, ChatUpdate, CommandMenuEntry, MessageId};

/// One recorded call into [`FakeChatApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeChatCall {
    SendMessage(ChatId, String),
    AnswerCallbackQuery(String, String),
}

/// A `ChatApi` that records every call — no network, no process boundary.
#[derive(Default)]
pub struct FakeChatApi {
    pub calls: Mutex<Vec<FakeChatCall>>,
    pub next_message_id: Mutex<i64>,
}

impl FakeChatApi {
    pub fn new() -> Self {
        Self { calls: Mutex::new(Vec::new()), next_message_id: Mutex::new(1) }
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
        Ok(BotInfo { full_name: "Fake Admin Bot".into(), username: "fake_admin_bot".into() })
    }

    async fn next_updates(&self, _timeout_secs: u64) -> anyhow::Result<Vec<ChatUpdate>> {
        Ok(Vec::new())
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> anyhow::Result<MessageId> {
        self.calls.lock().expect("lock").push(FakeChatCall::SendMessage(chat_id, text.to_string()));
        Ok(self.next_id())
    }

    async fn send_photo(&self, _chat_id: ChatId, _path: &Path, _caption: &str) -> anyhow::Result<MessageId> {
        Ok(self.next_id())
    }

    async fn send_animation(&self, _chat_id: ChatId, _path: &Path, _caption: &str) -> anyhow::Result<MessageId> {
        Ok(self.next_id())
    }

    async fn send_video(&self, _chat_id: ChatId, _path: &Path, _caption: &str) -> anyhow::Result<MessageId> {
        Ok(self.next_id())
    }

    async fn send_voice(&self, _chat_id: ChatId, _path: &Path, _caption: &str) -> anyhow::Result<MessageId> {
        Ok(self.next_id())
    }

    async fn send_audio(&self, _chat_id: ChatId, _path: &Path, _caption: &str) -> anyhow::Result<MessageId> {
        Ok(self.next_id())
    }

    async fn send_document(&self, _chat_id: ChatId, _path: &Path, _caption: &str) -> anyhow::Result<MessageId> {
        Ok(self.next_id())
    }

    async fn edit_message_media(&self, _chat_id: ChatId, _message_id: MessageId, _path: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    async fn edit_message_text(&self, _chat_id: ChatId, _message_id: MessageId, _text: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn delete_message(&self, _chat_id: ChatId, _message_id: MessageId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: &str) -> anyhow::Result<()> {
        self.calls.lock().expect("lock").push(FakeChatCall::AnswerCallbackQuery(callback_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn get_file_url(&self, file_id: &str) -> anyhow::Result<String> {
        Ok(format!("https://example.invalid/files/{file_id}"))
    }

    async fn set_my_commands(&self, _commands: &[CommandMenuEntry]) -> anyhow::Result<()> {
        Ok(())
    }
}
