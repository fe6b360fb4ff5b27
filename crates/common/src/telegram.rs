// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The one shipped [`ChatApi`] binding: the Telegram Bot HTTP API, reached
//! via `reqwest` with the `rustls-no-provider` feature (spec §6).

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Once;

use crate::chat::{
    BotInfo, CallbackQuery, ChatApi, ChatId, ChatUpdate, CommandMenuEntry, FileRef, IncomingMessage, MessageId,
    UserId,
};

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls. Safe to call
/// repeatedly; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Telegram Bot API client, implementing [`ChatApi`].
pub struct TelegramChatApi {
    client: Client,
    base_url: String,
    file_base_url: String,
    offset: AtomicI64,
}

impl TelegramChatApi {
    pub fn new(token: &str) -> Self {
        ensure_crypto();
        let client = Client::builder().timeout(std::time::Duration::from_secs(65)).build().unwrap_or_default();
        Self {
            client,
            base_url: format!("https://api.telegram.org/bot{token}"),
            file_base_url: format!("https://api.telegram.org/file/bot{token}"),
            offset: AtomicI64::new(0),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn send_media_file(
        &self,
        chat_id: ChatId,
        method: &str,
        field: &str,
        path: &Path,
        caption: &str,
    ) -> anyhow::Result<MessageId> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("file").to_string();
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename);
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.0.to_string())
            .text("caption", caption.to_string())
            .part(field.to_string(), part);

        let resp: TelegramEnvelope<TelegramMessage> =
            self.client.post(self.method_url(method)).multipart(form).send().await?.json().await?;
        let message = resp.into_result()?;
        Ok(MessageId(message.message_id))
    }
}

#[async_trait]
impl ChatApi for TelegramChatApi {
    async fn get_me(&self) -> anyhow::Result<BotInfo> {
        let resp: TelegramEnvelope<TelegramUser> =
            self.client.get(self.method_url("getMe")).send().await?.json().await?;
        let user = resp.into_result()?;
        Ok(BotInfo {
            full_name: [user.first_name.as_deref(), user.last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" "),
            username: user.username.unwrap_or_default(),
        })
    }

    async fn next_updates(&self, timeout_secs: u64) -> anyhow::Result<Vec<ChatUpdate>> {
        let offset = self.offset.load(Ordering::Relaxed);
        let body = json!({ "timeout": timeout_secs, "offset": offset, "allowed_updates": ["message", "callback_query"] });
        let resp: TelegramEnvelope<Vec<TelegramUpdate>> =
            self.client.post(self.method_url("getUpdates")).json(&body).send().await?.json().await?;
        let updates = resp.into_result()?;

        if let Some(last) = updates.last() {
            self.offset.store(last.update_id + 1, Ordering::Relaxed);
        }

        Ok(updates.into_iter().map(ChatUpdate::from).collect())
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> anyhow::Result<MessageId> {
        let body = json!({ "chat_id": chat_id.0, "text": text, "parse_mode": "Markdown" });
        let resp: TelegramEnvelope<TelegramMessage> =
            self.client.post(self.method_url("sendMessage")).json(&body).send().await?.json().await?;
        Ok(MessageId(resp.into_result()?.message_id))
    }

    async fn send_photo(&self, chat_id: ChatId, path: &Path, caption: &str) -> anyhow::Result<MessageId> {
        self.send_media_file(chat_id, "sendPhoto", "photo", path, caption).await
    }

    async fn send_animation(&self, chat_id: ChatId, path: &Path, caption: &str) -> anyhow::Result<MessageId> {
        self.send_media_file(chat_id, "sendAnimation", "animation", path, caption).await
    }

    async fn send_video(&self, chat_id: ChatId, path: &Path, caption: &str) -> anyhow::Result<MessageId> {
        self.send_media_file(chat_id, "sendVideo", "video", path, caption).await
    }

    async fn send_voice(&self, chat_id: ChatId, path: &Path, caption: &str) -> anyhow::Result<MessageId> {
        self.send_media_file(chat_id, "sendVoice", "voice", path, caption).await
    }

    async fn send_audio(&self, chat_id: ChatId, path: &Path, caption: &str) -> anyhow::Result<MessageId> {
        self.send_media_file(chat_id, "sendAudio", "audio", path, caption).await
    }

    async fn send_document(&self, chat_id: ChatId, path: &Path, caption: &str) -> anyhow::Result<MessageId> {
        self.send_media_file(chat_id, "sendDocument", "document", path, caption).await
    }

    async fn edit_message_media(&self, chat_id: ChatId, message_id: MessageId, path: &Path) -> anyhow::Result<()> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("file").to_string();
        let media = json!({ "type": "photo", "media": format!("attach://{filename}") });
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.clone());
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.0.to_string())
            .text("message_id", message_id.0.to_string())
            .text("media", media.to_string())
            .part(filename, part);

        let resp: TelegramEnvelope<serde_json::Value> =
            self.client.post(self.method_url("editMessageMedia")).multipart(form).send().await?.json().await?;
        resp.into_result()?;
        Ok(())
    }

    async fn edit_message_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> anyhow::Result<()> {
        let body = json!({ "chat_id": chat_id.0, "message_id": message_id.0, "text": text });
        let resp: TelegramEnvelope<serde_json::Value> =
            self.client.post(self.method_url("editMessageText")).json(&body).send().await?.json().await?;
        resp.into_result()?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> anyhow::Result<()> {
        let body = json!({ "chat_id": chat_id.0, "message_id": message_id.0 });
        let resp: TelegramEnvelope<serde_json::Value> =
            self.client.post(self.method_url("deleteMessage")).json(&body).send().await?.json().await?;
        // A 404 (message already gone) is silent per spec §7.
        if matches!(resp.error_code, Some(404)) {
            return Ok(());
        }
        resp.into_result()?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: &str) -> anyhow::Result<()> {
        let truncated = crate::error::truncate_callback_answer(text);
        let body = json!({ "callback_query_id": callback_id, "text": truncated });
        let resp: TelegramEnvelope<serde_json::Value> =
            self.client.post(self.method_url("answerCallbackQuery")).json(&body).send().await?.json().await?;
        resp.into_result()?;
        Ok(())
    }

    async fn get_file_url(&self, file_id: &str) -> anyhow::Result<String> {
        let body = json!({ "file_id": file_id });
        let resp: TelegramEnvelope<TelegramFile> =
            self.client.post(self.method_url("getFile")).json(&body).send().await?.json().await?;
        let file = resp.into_result()?;
        let path = file.file_path.ok_or_else(|| anyhow::anyhow!("file_path missing in getFile response"))?;
        Ok(format!("{}/{}", self.file_base_url, path))
    }

    async fn set_my_commands(&self, commands: &[CommandMenuEntry]) -> anyhow::Result<()> {
        let body = json!({
            "commands": commands.iter().map(|c| json!({
                "command": c.command,
                "description": c.description,
            })).collect::<Vec<_>>()
        });
        let resp: TelegramEnvelope<bool> =
            self.client.post(self.method_url("setMyCommands")).json(&body).send().await?.json().await?;
        resp.into_result()?;
        Ok(())
    }
}

// -- Wire shapes --------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TelegramEnvelope<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
}

impl<T> TelegramEnvelope<T> {
    fn into_result(self) -> anyhow::Result<T> {
        if self.ok {
            self.result.ok_or_else(|| anyhow::anyhow!("telegram response missing result"))
        } else {
            anyhow::bail!(
                "telegram API error {}: {}",
                self.error_code.unwrap_or(0),
                self.description.unwrap_or_default()
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramFile {
    file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramFrom {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramVoiceOrAudio {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct TelegramIncomingMessage {
    chat: TelegramChat,
    from: Option<TelegramFrom>,
    text: Option<String>,
    voice: Option<TelegramVoiceOrAudio>,
    audio: Option<TelegramVoiceOrAudio>,
}

#[derive(Debug, Deserialize)]
struct TelegramCallbackQuery {
    id: String,
    from: Option<TelegramFrom>,
    message: Option<TelegramCallbackMessage>,
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramCallbackMessage {
    message_id: i64,
    chat: TelegramChat,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramIncomingMessage>,
    callback_query: Option<TelegramCallbackQuery>,
}

impl From<TelegramUpdate> for ChatUpdate {
    fn from(update: TelegramUpdate) -> Self {
        if let Some(message) = update.message {
            return ChatUpdate::Message(IncomingMessage {
                chat_id: ChatId(message.chat.id),
                user_id: message.from.map(|f| UserId(f.id)),
                text: message.text,
                voice: message.voice.map(|v| FileRef { file_id: v.file_id }),
                audio: message.audio.map(|a| FileRef { file_id: a.file_id }),
            });
        }
        if let Some(callback) = update.callback_query {
            return ChatUpdate::CallbackQuery(CallbackQuery {
                id: callback.id,
                chat_id: callback
                    .message
                    .as_ref()
                    .map(|m| ChatId(m.chat.id))
                    .unwrap_or(ChatId(0)),
                user_id: callback.from.map(|f| UserId(f.id)),
                message_id: callback.message.map(|m| MessageId(m.message_id)),
                data: callback.data.unwrap_or_default(),
            });
        }
        ChatUpdate::Unknown
    }
}

#[cfg(test)]
#[path = "telegram_tests.rs"]
mod tests;
