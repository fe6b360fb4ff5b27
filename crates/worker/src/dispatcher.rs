// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command Dispatcher (spec §4.5): the single routing point between chat
//! updates and PTY sessions. Every update is parsed into a closed
//! [`Command`]/[`CallbackCommand`] once, at the edge, then matched
//! exhaustively — handlers never re-parse raw text.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::time::Duration;

use fleet_common::chat::{
    no_session_commands, session_commands, CallbackQuery, ChatApi, ChatId, ChatUpdate, FileRef, IncomingMessage, MessageId, UserId,
};
use fleet_common::config::Config;
use fleet_common::error::{truncate_callback_answer, ErrorCode, TranscriptionError};
use fleet_common::ipc::{IpcEnvelope, IpcMessage, IpcWriter};
use reqwest::Client;
use tokio::sync::{Mutex, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::analyser::{analyse_chunk, AnalyserEvent};
use crate::gate::{self, GateDecision};
use crate::renderer::RendererClient;
use crate::session::{PtySession, SessionCallbacks, SessionError, SessionManager};
use crate::transcribe::Transcriber;

/// Worker's side of the supervisor IPC pipe, shared with `main.rs`'s own
/// bootstrap/health-check traffic (spec §6: "over the child's
/// stdin/stdout pipes").
pub type WorkerIpcOut = Arc<Mutex<IpcWriter<tokio::io::Stdout>>>;

/// Reserved for a worker exiting on its own initiative for a reason other
/// than a clean `/killbot` shutdown (spec §6: "normal shutdown" is 0;
/// anything else is a crash unless the supervisor is told otherwise).
const AUTO_KILL_EXIT_CODE: i32 = 3;

fn now_ms() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

/// Which CLI a `/copilot|/claude|/gemini|/xterm` open-session command
/// launches once the PTY is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Copilot,
    Claude,
    Gemini,
    Xterm,
}

impl SessionKind {
    /// The literal written to the PTY right after spawn. `None` for a
    /// plain shell — there is nothing to launch.
    fn launch_command(self) -> Option<&'static str> {
        match self {
            Self::Copilot => Some("copilot"),
            Self::Claude => Some("claude"),
            Self::Gemini => Some("gemini"),
            Self::Xterm => None,
        }
    }
}

/// The closed set of text commands the dispatcher understands (spec §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    OpenSession { kind: SessionKind, dir: Option<String> },
    Close,
    PlainText(String),
    SpecialKey(&'static str),
    Ctrl(char),
    Digit(u8),
    Screen,
    Urls,
    KillBot,
    AudioMode,
    Unknown,
}

/// Parse one inbound text message into a [`Command`]. Plain text (no
/// leading `/`) always routes to [`Command::PlainText`] unmodified; the
/// leading-`.` strip and placeholder substitution happen at write time.
pub fn parse_command(text: &str) -> Command {
    let Some(rest) = text.strip_prefix('/') else {
        return Command::PlainText(text.to_string());
    };

    let mut parts = rest.splitn(2, ' ');
    let name = parts.next().unwrap_or("");
    let arg = parts.next().map(str::trim).filter(|s| !s.is_empty()).map(String::from);

    match name {
        "copilot" => Command::OpenSession { kind: SessionKind::Copilot, dir: arg },
        "claude" => Command::OpenSession { kind: SessionKind::Claude, dir: arg },
        "gemini" => Command::OpenSession { kind: SessionKind::Gemini, dir: arg },
        "xterm" => Command::OpenSession { kind: SessionKind::Xterm, dir: arg },
        "close" => Command::Close,
        "screen" => Command::Screen,
        "urls" => Command::Urls,
        "killbot" => Command::KillBot,
        "audiomode" => Command::AudioMode,
        "tab" => Command::SpecialKey("tab"),
        "enter" => Command::SpecialKey("enter"),
        "space" => Command::SpecialKey("space"),
        "delete" => Command::SpecialKey("delete"),
        "esc" => Command::SpecialKey("esc"),
        "arrowup" => Command::SpecialKey("arrowup"),
        "arrowdown" => Command::SpecialKey("arrowdown"),
        "ctrlc" => Command::SpecialKey("ctrlc"),
        "ctrlx" => Command::SpecialKey("ctrlx"),
        "ctrl" => match arg.as_deref().and_then(|a| a.chars().next()) {
            Some(ch) => Command::Ctrl(ch),
            None => Command::Unknown,
        },
        "1" | "2" | "3" | "4" | "5" => Command::Digit(name.as_bytes()[0] - b'0'),
        _ => Command::Unknown,
    }
}

/// The closed set of inline-keyboard callback-data values (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackCommand {
    RefreshScreen,
    Digit(u8),
    Esc,
    Unknown,
}

pub fn parse_callback(data: &str) -> CallbackCommand {
    match data {
        "refresh_screen" => CallbackCommand::RefreshScreen,
        "num_1" => CallbackCommand::Digit(1),
        "num_2" => CallbackCommand::Digit(2),
        "num_3" => CallbackCommand::Digit(3),
        "key_esc" => CallbackCommand::Esc,
        _ => CallbackCommand::Unknown,
    }
}

/// Reject a `dir` argument containing any shell metacharacter, or one
/// that doesn't name an existing directory (spec §4.5).
fn is_safe_dir(dir: &str) -> bool {
    const FORBIDDEN: [char; 7] = [';', '&', '|', '`', '$', '(', ')'];
    if dir.chars().any(|c| FORBIDDEN.contains(&c)) {
        return false;
    }
    Path::new(dir).is_dir()
}

async fn render_and_send_screen(
    chat: &Arc<dyn ChatApi>,
    renderer: &Arc<RendererClient>,
    font_size: u16,
    chat_id: ChatId,
    session: &Arc<PtySession>,
) -> Result<MessageId, ErrorCode> {
    let (buffer, cols, rows) = session.snapshot().await;
    let png = renderer.render(&buffer, rows, cols, font_size).await.map_err(|_| ErrorCode::RenderFailed)?;
    let tmp = tempfile::Builder::new().suffix(".png").tempfile().map_err(|_| ErrorCode::Internal)?;
    std::fs::write(tmp.path(), &png).map_err(|_| ErrorCode::Internal)?;
    let message_id = chat.send_photo(chat_id, tmp.path(), "").await.map_err(|_| ErrorCode::ChatApiTransient)?;
    *session.last_screenshot_msg_id.lock().await = Some(message_id);
    session.last_screenshot_buffer_hash.store(crate::refresh::hash_bytes(&buffer), Ordering::SeqCst);
    Ok(message_id)
}

async fn render_and_edit_screen(
    chat: &Arc<dyn ChatApi>,
    renderer: &Arc<RendererClient>,
    font_size: u16,
    chat_id: ChatId,
    message_id: MessageId,
    session: &Arc<PtySession>,
) -> Result<(), ErrorCode> {
    let (buffer, cols, rows) = session.snapshot().await;
    let png = renderer.render(&buffer, rows, cols, font_size).await.map_err(|_| ErrorCode::RenderFailed)?;
    let tmp = tempfile::Builder::new().suffix(".png").tempfile().map_err(|_| ErrorCode::Internal)?;
    std::fs::write(tmp.path(), &png).map_err(|_| ErrorCode::Internal)?;
    chat.edit_message_media(chat_id, message_id, tmp.path()).await.map_err(|_| ErrorCode::ChatApiTransient)?;
    session.last_screenshot_buffer_hash.store(crate::refresh::hash_bytes(&buffer), Ordering::SeqCst);
    Ok(())
}

/// Holds references to every other worker-side collaborator and routes
/// one update at a time (spec §4.5: "stateless per invocation").
pub struct Dispatcher {
    config: Arc<Config>,
    sessions: Arc<SessionManager>,
    chat: Arc<dyn ChatApi>,
    renderer: Arc<RendererClient>,
    transcriber: Option<Arc<dyn Transcriber>>,
    bot_id: String,
    http: Client,
    ipc_out: WorkerIpcOut,
    /// Per-user `/audiomode` toggle: present means "write transcript to
    /// the active session"; absent means the default, "echo it back".
    audio_write_mode: Mutex<HashSet<UserId>>,
}

impl Dispatcher {
    pub fn new(
        config: Arc<Config>,
        sessions: Arc<SessionManager>,
        chat: Arc<dyn ChatApi>,
        renderer: Arc<RendererClient>,
        transcriber: Option<Arc<dyn Transcriber>>,
        bot_id: String,
        ipc_out: WorkerIpcOut,
    ) -> Self {
        let http = Client::builder().timeout(Duration::from_secs(30)).build().unwrap_or_default();
        Self { config, sessions, chat, renderer, transcriber, bot_id, http, ipc_out, audio_write_mode: Mutex::new(HashSet::new()) }
    }

    fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.config.screen_refresh_interval_ms)
    }

    fn startup_prompt_path(&self) -> PathBuf {
        self.config.media_dir(&self.bot_id).join("startup_prompt.txt")
    }

    /// Entry point for every update read off the chat API (spec §4.5).
    pub async fn handle_update(&self, update: ChatUpdate) {
        match update {
            ChatUpdate::Message(msg) => self.handle_message(msg).await,
            ChatUpdate::CallbackQuery(cb) => self.handle_callback(cb).await,
            ChatUpdate::Unknown => {}
        }
    }

    async fn handle_message(&self, msg: IncomingMessage) {
        let decision = gate::check(&self.chat, msg.chat_id, msg.user_id, &self.config.allowed_user_ids, self.config.auto_kill).await;
        let user_id = match decision {
            GateDecision::Allowed => match msg.user_id {
                Some(u) => u,
                None => return,
            },
            GateDecision::NoUserId => return,
            GateDecision::Denied { auto_kill } => {
                if auto_kill {
                    self.schedule_auto_kill();
                }
                return;
            }
        };

        if let Some(file_ref) = msg.voice.clone().or_else(|| msg.audio.clone()) {
            self.handle_audio(user_id, msg.chat_id, file_ref).await;
            return;
        }

        let Some(text) = msg.text else { return };
        let command = parse_command(&text);
        if let Err(code) = self.dispatch_command(user_id, msg.chat_id, command).await {
            let _ = self.chat.send_message(msg.chat_id, code.user_message()).await;
        }
    }

    async fn handle_callback(&self, cb: CallbackQuery) {
        let decision = gate::check(&self.chat, cb.chat_id, cb.user_id, &self.config.allowed_user_ids, self.config.auto_kill).await;
        let user_id = match decision {
            GateDecision::Allowed => match cb.user_id {
                Some(u) => u,
                None => return,
            },
            GateDecision::NoUserId => return,
            GateDecision::Denied { auto_kill } => {
                if auto_kill {
                    self.schedule_auto_kill();
                }
                return;
            }
        };

        let command = parse_callback(&cb.data);
        let answer = match self.dispatch_callback(user_id, cb.chat_id, cb.message_id, command).await {
            Ok(text) => text,
            Err(code) => code.user_message().to_string(),
        };
        if !answer.is_empty() {
            let _ = self.chat.answer_callback_query(&cb.id, &truncate_callback_answer(&answer)).await;
        }
    }

    async fn dispatch_command(&self, user_id: UserId, chat_id: ChatId, command: Command) -> Result<(), ErrorCode> {
        match command {
            Command::OpenSession { kind, dir } => self.open_session(user_id, chat_id, kind, dir).await,
            Command::Close => self.close_session(user_id, chat_id).await,
            Command::PlainText(text) => self.write_text(user_id, &text).await,
            Command::SpecialKey(name) => self.write_special_key(user_id, name).await,
            Command::Ctrl(ch) => self.write_ctrl(user_id, ch).await,
            Command::Digit(d) => self.write_digit(user_id, d).await,
            Command::Screen => self.send_screen(user_id, chat_id).await,
            Command::Urls => self.list_urls(user_id, chat_id).await,
            Command::KillBot => std::process::exit(0),
            Command::AudioMode => self.toggle_audio_mode(user_id, chat_id).await,
            Command::Unknown => Ok(()),
        }
    }

    async fn dispatch_callback(
        &self,
        user_id: UserId,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        command: CallbackCommand,
    ) -> Result<String, ErrorCode> {
        match command {
            CallbackCommand::RefreshScreen => {
                let session = self.sessions.get(user_id).await.ok_or(ErrorCode::SessionNotFound)?;
                let message_id = message_id.ok_or(ErrorCode::Internal)?;
                render_and_edit_screen(&self.chat, &self.renderer, self.config.font_size, chat_id, message_id, &session).await?;
                Ok("Refreshed".to_string())
            }
            CallbackCommand::Digit(d) => {
                self.write_digit(user_id, d).await?;
                Ok("Sent".to_string())
            }
            CallbackCommand::Esc => {
                self.write_special_key(user_id, "esc").await?;
                Ok("Sent".to_string())
            }
            CallbackCommand::Unknown => Ok(String::new()),
        }
    }

    async fn open_session(&self, user_id: UserId, chat_id: ChatId, kind: SessionKind, dir: Option<String>) -> Result<(), ErrorCode> {
        if let Some(dir) = &dir {
            if !is_safe_dir(dir) {
                let _ = self.chat.send_message(chat_id, "Invalid directory.").await;
                return Ok(());
            }
        }

        let (callbacks, session_cell) = self.build_session_callbacks();
        let session = match self.sessions.create_session(user_id, chat_id, callbacks).await {
            Ok(session) => session,
            Err(SessionError::AlreadyExists) => return Err(ErrorCode::SessionExists),
            Err(SessionError::SpawnFailed) | Err(SessionError::NotFound) => return Err(ErrorCode::PtySpawnFailed),
        };
        let _ = session_cell.set(Arc::downgrade(&session));

        if let Some(dir) = &dir {
            let _ = session.write(&format!("cd {dir}"), true).await;
        }
        if let Some(launch) = kind.launch_command() {
            let _ = session.write(launch, true).await;
        }

        let _ = self.chat.set_my_commands(&session_commands()).await;

        let sessions = Arc::clone(&self.sessions);
        let chat = Arc::clone(&self.chat);
        let renderer = Arc::clone(&self.renderer);
        let font_size = self.config.font_size;
        let warmup_session = Arc::clone(&session);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            if !sessions.exists(user_id).await {
                return;
            }
            if let Err(e) = render_and_send_screen(&chat, &renderer, font_size, chat_id, &warmup_session).await {
                warn!(user_id = user_id.0, error = %e, "initial screenshot failed");
            }
        });

        if matches!(kind, SessionKind::Copilot) {
            self.spawn_copilot_startup_prompt(session);
        }

        Ok(())
    }

    fn spawn_copilot_startup_prompt(&self, session: Arc<PtySession>) {
        let path = self.startup_prompt_path();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            let Ok(prompt) = tokio::fs::read_to_string(&path).await else { return };
            let trimmed = prompt.trim();
            if !trimmed.is_empty() {
                let _ = session.write(trimmed, true).await;
            }
        });
    }

    async fn close_session(&self, user_id: UserId, _chat_id: ChatId) -> Result<(), ErrorCode> {
        match self.sessions.close(user_id).await {
            Ok(()) => {
                let _ = self.chat.set_my_commands(&no_session_commands()).await;
                Ok(())
            }
            Err(_) => Err(ErrorCode::SessionNotFound),
        }
    }

    async fn write_text(&self, user_id: UserId, text: &str) -> Result<(), ErrorCode> {
        let session = self.sessions.get(user_id).await.ok_or(ErrorCode::SessionNotFound)?;
        let stripped = text.strip_prefix('.').unwrap_or(text);
        let media_dir = self.config.media_dir(&self.bot_id);
        let media_dir = media_dir.to_string_lossy();
        let expanded = fleet_common::placeholder::substitute(stripped, |n| self.config.placeholder(n).map(String::from), &media_dir);

        session.write_raw(expanded.as_bytes()).await.map_err(|_| ErrorCode::Internal)?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.write_raw(b"\r").await.map_err(|_| ErrorCode::Internal)?;

        session
            .refresh
            .request_refresh(
                Arc::clone(&session),
                Arc::clone(&self.chat),
                Arc::clone(&self.renderer),
                self.refresh_interval(),
                self.config.screen_refresh_max_count,
                self.config.font_size,
            )
            .await;
        Ok(())
    }

    async fn write_special_key(&self, user_id: UserId, name: &'static str) -> Result<(), ErrorCode> {
        let session = self.sessions.get(user_id).await.ok_or(ErrorCode::SessionNotFound)?;
        let bytes = fleet_common::keys::special_key_bytes(name).ok_or(ErrorCode::Internal)?;
        session.write_raw(bytes).await.map_err(|_| ErrorCode::Internal)
    }

    async fn write_ctrl(&self, user_id: UserId, ch: char) -> Result<(), ErrorCode> {
        let session = self.sessions.get(user_id).await.ok_or(ErrorCode::SessionNotFound)?;
        let byte = fleet_common::keys::ctrl_byte(ch).ok_or(ErrorCode::Internal)?;
        session.write_raw(&[byte]).await.map_err(|_| ErrorCode::Internal)
    }

    async fn write_digit(&self, user_id: UserId, digit: u8) -> Result<(), ErrorCode> {
        let session = self.sessions.get(user_id).await.ok_or(ErrorCode::SessionNotFound)?;
        session.write_raw(digit.to_string().as_bytes()).await.map_err(|_| ErrorCode::Internal)
    }

    async fn send_screen(&self, user_id: UserId, chat_id: ChatId) -> Result<(), ErrorCode> {
        let session = self.sessions.get(user_id).await.ok_or(ErrorCode::SessionNotFound)?;
        render_and_send_screen(&self.chat, &self.renderer, self.config.font_size, chat_id, &session).await?;
        Ok(())
    }

    async fn list_urls(&self, user_id: UserId, chat_id: ChatId) -> Result<(), ErrorCode> {
        let session = self.sessions.get(user_id).await.ok_or(ErrorCode::SessionNotFound)?;
        let urls = session.discovered_urls.lock().await;
        let text = if urls.is_empty() { "No URLs discovered yet.".to_string() } else { urls.iter().cloned().collect::<Vec<_>>().join("\n") };
        drop(urls);
        self.chat.send_message(chat_id, &text).await.map_err(|_| ErrorCode::ChatApiTransient)?;
        Ok(())
    }

    async fn toggle_audio_mode(&self, user_id: UserId, chat_id: ChatId) -> Result<(), ErrorCode> {
        let write_mode_now = {
            let mut modes = self.audio_write_mode.lock().await;
            if modes.remove(&user_id) {
                false
            } else {
                modes.insert(user_id);
                true
            }
        };
        let text = if write_mode_now { "Audio mode: transcripts are written to the session." } else { "Audio mode: transcripts are echoed back." };
        self.chat.send_message(chat_id, text).await.map_err(|_| ErrorCode::ChatApiTransient)?;
        Ok(())
    }

    async fn handle_audio(&self, user_id: UserId, chat_id: ChatId, file_ref: FileRef) {
        let Some(transcriber) = self.transcriber.clone() else {
            let _ = self.chat.send_message(chat_id, ErrorCode::Transcription(TranscriptionError::NoKey).user_message()).await;
            return;
        };

        let text = match self.download_and_transcribe(&transcriber, &file_ref).await {
            Ok(text) => text,
            Err(code) => {
                let _ = self.chat.send_message(chat_id, ErrorCode::Transcription(code).user_message()).await;
                return;
            }
        };

        let write_mode = self.audio_write_mode.lock().await.contains(&user_id);
        if write_mode {
            match self.sessions.get(user_id).await {
                Some(session) => {
                    let _ = session.write(&text, true).await;
                }
                None => {
                    let _ = self.chat.send_message(chat_id, ErrorCode::SessionNotFound.user_message()).await;
                }
            }
        } else {
            let _ = self.chat.send_message(chat_id, &text).await;
        }
    }

    async fn download_and_transcribe(&self, transcriber: &Arc<dyn Transcriber>, file_ref: &FileRef) -> Result<String, TranscriptionError> {
        let url = self.chat.get_file_url(&file_ref.file_id).await.map_err(|_| TranscriptionError::DownloadFailed)?;
        let response = self.http.get(&url).send().await.map_err(|_| TranscriptionError::DownloadFailed)?;
        let bytes = response.bytes().await.map_err(|_| TranscriptionError::DownloadFailed)?;

        let dir = self.config.media_dir(&self.bot_id).join("tmp");
        tokio::fs::create_dir_all(&dir).await.map_err(|_| TranscriptionError::DownloadFailed)?;
        let path = dir.join(format!("{}.ogg", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, &bytes).await.map_err(|_| TranscriptionError::DownloadFailed)?;

        let result = transcriber.transcribe(&path).await;
        let _ = tokio::fs::remove_file(&path).await;
        result
    }

    /// Build the session's `on_data` fan-out: every PTY output chunk runs
    /// through the analyser, and bell/confirmation events request a
    /// refresh while URL discoveries get an immediate chat notification.
    /// The returned [`OnceCell`] must be filled with the session's own
    /// `Weak` handle right after `create_session` returns it, since the
    /// callback is wired in before the `Arc<PtySession>` exists.
    fn build_session_callbacks(&self) -> (SessionCallbacks, Arc<OnceCell<Weak<PtySession>>>) {
        let cell: Arc<OnceCell<Weak<PtySession>>> = Arc::new(OnceCell::new());
        let cb_cell = Arc::clone(&cell);
        let chat = Arc::clone(&self.chat);
        let renderer = Arc::clone(&self.renderer);
        let interval = self.refresh_interval();
        let max_ticks = self.config.screen_refresh_max_count;
        let font_size = self.config.font_size;
        let delete_timeout_ms = self.config.message_delete_timeout_ms;

        let on_data: Arc<dyn Fn(&[u8]) + Send + Sync> = Arc::new(move |chunk: &[u8]| {
            let Some(session) = cb_cell.get().and_then(Weak::upgrade) else { return };
            let chunk = bytes::Bytes::copy_from_slice(chunk);
            let chat = Arc::clone(&chat);
            let renderer = Arc::clone(&renderer);
            tokio::spawn(async move {
                for event in analyse_chunk(&session, &chunk).await {
                    match event {
                        AnalyserEvent::Bell | AnalyserEvent::ConfirmationPrompt => {
                            session
                                .refresh
                                .request_refresh(Arc::clone(&session), Arc::clone(&chat), Arc::clone(&renderer), interval, max_ticks, font_size)
                                .await;
                        }
                        AnalyserEvent::UrlDiscovered(url) => {
                            if let Ok(message_id) = chat.send_message(session.chat_id, &format!("URL discovered: {url}")).await {
                                spawn_message_delete_timer(Arc::clone(&chat), session.scope.clone(), session.chat_id, message_id, delete_timeout_ms);
                            }
                        }
                    }
                }
            });
        });

        (SessionCallbacks { on_data: Some(on_data), on_buffering_ended: None }, cell)
    }

    /// An unauthorised update with `autoKill` set: tell the supervisor
    /// this exit is intentional (so it isn't auto-restarted), then exit
    /// **non-zero** (spec §8 scenario 6: "exits non-zero within 2s";
    /// §6 reserves 0 for normal shutdown). The supervisor learns "don't
    /// restart" from the `StatusUpdate { status: "auto_kill" }` marker
    /// sent here, never from the exit code itself.
    fn schedule_auto_kill(&self) {
        let ipc_out = Arc::clone(&self.ipc_out);
        let bot_id = self.bot_id.clone();
        tokio::spawn(async move {
            let envelope = IpcEnvelope::new(bot_id, now_ms(), IpcMessage::StatusUpdate { status: "auto_kill".to_string() });
            if let Err(e) = ipc_out.lock().await.send(&envelope).await {
                warn!(error = %e, "failed to notify supervisor before auto-kill exit");
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
            std::process::exit(AUTO_KILL_EXIT_CODE);
        });
    }
}

/// Schedule deletion of a transient message after `timeout_ms`, cancelled
/// if `scope` (the owning session's cancellation scope) fires first (spec
/// §3 `UrlNotificationTimer`, §4.5, §5: "Message auto-delete:
/// `messageDeleteTimeoutMs`; 0 disables"). A 404 on delete is silent
/// (spec §7) since the message may already be gone.
fn spawn_message_delete_timer(chat: Arc<dyn ChatApi>, scope: CancellationToken, chat_id: ChatId, message_id: MessageId, timeout_ms: u64) {
    if timeout_ms == 0 {
        return;
    }
    tokio::spawn(async move {
        tokio::select! {
            _ = scope.cancelled() => {}
            _ = tokio::time::sleep(Duration::from_millis(timeout_ms)) => {
                let _ = chat.delete_message(chat_id, message_id).await;
            }
        }
    });
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
