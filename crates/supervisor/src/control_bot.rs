// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The admin `ControlBot` (spec §4.8): a chat interface, running on the
//! supervisor, that issues fleet-wide commands. Routing mirrors the
//! worker dispatcher's shape (spec §4.5) — parse once into a closed
//! enum, match exhaustively — over a distinct command vocabulary and a
//! distinct access gate ([`crate::gate`]).

use std::fmt::Write as _;
use std::sync::Arc;

use fleet_common::chat::{CallbackQuery, ChatApi, ChatUpdate, IncomingMessage};
use fleet_common::telegram::TelegramChatApi;
use tracing::warn;

use crate::gate;
use crate::manager::{FleetError, Supervisor};
use crate::persist;
use crate::worker_process::WorkerSnapshot;

/// The closed set of admin slash-commands (spec §4.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Status,
    Start(Option<String>),
    Stop(Option<String>),
    Restart(Option<String>),
    StopAll,
    StartAll,
    RestartAll,
    AddBot(Option<String>),
    RemoveBot(Option<String>),
    Reload,
    Logs(Option<String>),
    Health(Option<String>),
    Uptime(Option<String>),
    Shutdown,
    Help,
    Unknown,
}

pub fn parse_command(text: &str) -> ControlCommand {
    let Some(rest) = text.strip_prefix('/') else {
        return ControlCommand::Unknown;
    };
    let mut parts = rest.splitn(2, ' ');
    let name = parts.next().unwrap_or("");
    let arg = parts.next().map(str::trim).filter(|s| !s.is_empty()).map(String::from);

    match name {
        "status" => ControlCommand::Status,
        "start" => ControlCommand::Start(arg),
        "stop" => ControlCommand::Stop(arg),
        "restart" => ControlCommand::Restart(arg),
        "stopall" => ControlCommand::StopAll,
        "startall" => ControlCommand::StartAll,
        "restartall" => ControlCommand::RestartAll,
        "addbot" => ControlCommand::AddBot(arg),
        "removebot" => ControlCommand::RemoveBot(arg),
        "reload" => ControlCommand::Reload,
        "logs" => ControlCommand::Logs(arg),
        "health" => ControlCommand::Health(arg),
        "uptime" => ControlCommand::Uptime(arg),
        "shutdown" => ControlCommand::Shutdown,
        "help" => ControlCommand::Help,
        _ => ControlCommand::Unknown,
    }
}

/// The closed set of inline-keyboard callback-data values mirroring the
/// per-bot actions above (spec §4.8: "inline-keyboard callbacks
/// mirroring per-bot actions").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCallback {
    Restart(String),
    Stop(String),
    Start(String),
    Health(String),
    Unknown,
}

pub fn parse_callback(data: &str) -> ControlCallback {
    let Some((action, bot_id)) = data.split_once(':') else {
        return ControlCallback::Unknown;
    };
    match action {
        "restart" => ControlCallback::Restart(bot_id.to_string()),
        "stop" => ControlCallback::Stop(bot_id.to_string()),
        "start" => ControlCallback::Start(bot_id.to_string()),
        "health" => ControlCallback::Health(bot_id.to_string()),
        _ => ControlCallback::Unknown,
    }
}

const HELP_TEXT: &str = "/status /start <bot> /stop <bot> /restart <bot> /stopall /startall /restartall \
/addbot <token> /removebot <bot> /reload /logs <bot> /health <bot> /uptime <bot> /shutdown /help";

fn format_snapshot(snapshot: &WorkerSnapshot) -> String {
    let mut line = format!("{} [{}] {}", snapshot.bot_id, snapshot.masked_token, snapshot.status.as_str());
    if let Some(pid) = snapshot.os_pid {
        let _ = write!(line, " pid={pid}");
    }
    if let Some(uptime) = snapshot.uptime {
        let _ = write!(line, " uptime={}s", uptime.as_secs());
    }
    if let Some(err) = &snapshot.last_error {
        let _ = write!(line, " last_error={err}");
    }
    line
}

/// The admin chat interface, running on the supervisor process.
pub struct ControlBot {
    supervisor: Arc<Supervisor>,
    chat: Arc<dyn ChatApi>,
}

impl ControlBot {
    pub fn new(supervisor: Arc<Supervisor>, token: &str) -> Self {
        Self { supervisor, chat: Arc::new(TelegramChatApi::new(token)) }
    }

    /// Long-poll the admin chat until the supervisor shuts down.
    pub async fn run(&self) {
        loop {
            if self.supervisor.shutdown.is_cancelled() {
                return;
            }
            tokio::select! {
                _ = self.supervisor.shutdown.cancelled() => return,
                result = self.chat.next_updates(30) => {
                    match result {
                        Ok(updates) => {
                            for update in updates {
                                self.handle_update(update).await;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "control bot next_updates failed, backing off");
                            tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                        }
                    }
                }
            }
        }
    }

    async fn handle_update(&self, update: ChatUpdate) {
        match update {
            ChatUpdate::Message(msg) => self.handle_message(msg).await,
            ChatUpdate::CallbackQuery(cb) => self.handle_callback(cb).await,
            ChatUpdate::Unknown => {}
        }
    }

    async fn handle_message(&self, msg: IncomingMessage) {
        if !gate::check(&self.chat, msg.chat_id, msg.user_id, &self.supervisor.config.control_admin_ids).await {
            return;
        }
        let Some(text) = msg.text else { return };
        let reply = self.dispatch(parse_command(&text)).await;
        if !reply.is_empty() {
            if let Err(e) = self.chat.send_message(msg.chat_id, &reply).await {
                warn!(error = %e, "failed to send control-bot reply");
            }
        }
    }

    async fn handle_callback(&self, cb: CallbackQuery) {
        if !gate::check(&self.chat, cb.chat_id, cb.user_id, &self.supervisor.config.control_admin_ids).await {
            return;
        }
        let answer = match parse_callback(&cb.data) {
            ControlCallback::Restart(bot_id) => self.restart_one(&bot_id).await,
            ControlCallback::Stop(bot_id) => self.stop_one(&bot_id).await,
            ControlCallback::Start(bot_id) => self.start_one(&bot_id).await,
            ControlCallback::Health(bot_id) => self.health_one(&bot_id).await,
            ControlCallback::Unknown => String::new(),
        };
        if !answer.is_empty() {
            let _ = self.chat.answer_callback_query(&cb.id, &fleet_common::error::truncate_callback_answer(&answer)).await;
        }
    }

    async fn dispatch(&self, command: ControlCommand) -> String {
        match command {
            ControlCommand::Status => self.status().await,
            ControlCommand::Start(Some(bot_id)) => self.start_one(&bot_id).await,
            ControlCommand::Stop(Some(bot_id)) => self.stop_one(&bot_id).await,
            ControlCommand::Restart(Some(bot_id)) => self.restart_one(&bot_id).await,
            ControlCommand::Start(None) | ControlCommand::Stop(None) | ControlCommand::Restart(None) => {
                "usage: /start|/stop|/restart <bot-id>".to_string()
            }
            ControlCommand::StopAll => {
                self.supervisor.stop_all().await;
                "stopping all bots".to_string()
            }
            ControlCommand::StartAll => {
                self.supervisor.start_all_stopped().await;
                "starting all stopped bots".to_string()
            }
            ControlCommand::RestartAll => {
                self.supervisor.restart_all().await;
                "restarting all bots".to_string()
            }
            ControlCommand::AddBot(Some(token)) => self.add_bot(token).await,
            ControlCommand::AddBot(None) => "usage: /addbot <token>".to_string(),
            ControlCommand::RemoveBot(Some(bot_id)) => self.remove_bot(&bot_id).await,
            ControlCommand::RemoveBot(None) => "usage: /removebot <bot-id>".to_string(),
            ControlCommand::Reload => self.reload().await,
            ControlCommand::Logs(Some(bot_id)) => self.logs(&bot_id).await,
            ControlCommand::Logs(None) => "usage: /logs <bot-id>".to_string(),
            ControlCommand::Health(Some(bot_id)) => self.health_one(&bot_id).await,
            ControlCommand::Health(None) => "usage: /health <bot-id>".to_string(),
            ControlCommand::Uptime(Some(bot_id)) => self.uptime(&bot_id).await,
            ControlCommand::Uptime(None) => "usage: /uptime <bot-id>".to_string(),
            ControlCommand::Shutdown => {
                self.supervisor.shutdown.cancel();
                "shutting down".to_string()
            }
            ControlCommand::Help => HELP_TEXT.to_string(),
            ControlCommand::Unknown => String::new(),
        }
    }

    async fn status(&self) -> String {
        let snapshots = self.supervisor.list().await;
        if snapshots.is_empty() {
            return "no bots registered".to_string();
        }
        snapshots.iter().map(format_snapshot).collect::<Vec<_>>().join("\n")
    }

    async fn start_one(&self, bot_id: &str) -> String {
        let Some(worker) = self.supervisor.get(bot_id).await else {
            return FleetError::NotFound(bot_id.to_string()).to_string();
        };
        let index = self.supervisor.list().await.iter().position(|s| s.bot_id == bot_id).unwrap_or(0);
        let token = worker.current_token().await;
        match self.supervisor.start_bot(bot_id, index, token).await {
            Ok(()) => format!("{bot_id} started"),
            Err(e) => format!("{bot_id} failed to start: {e}"),
        }
    }

    async fn stop_one(&self, bot_id: &str) -> String {
        match self.supervisor.stop_bot(bot_id).await {
            Ok(()) => format!("{bot_id} stopped"),
            Err(e) => e.to_string(),
        }
    }

    async fn restart_one(&self, bot_id: &str) -> String {
        match self.supervisor.restart_bot(bot_id).await {
            Ok(()) => format!("{bot_id} restarted"),
            Err(e) => e.to_string(),
        }
    }

    async fn health_one(&self, bot_id: &str) -> String {
        match self.supervisor.health_check(bot_id).await {
            Ok(true) => format!("{bot_id} healthy"),
            Ok(false) => format!("{bot_id} unhealthy (no HEALTH_RESPONSE within 5s)"),
            Err(e) => e.to_string(),
        }
    }

    async fn uptime(&self, bot_id: &str) -> String {
        let Some(worker) = self.supervisor.get(bot_id).await else {
            return FleetError::NotFound(bot_id.to_string()).to_string();
        };
        match worker.snapshot().await.uptime {
            Some(uptime) => format!("{bot_id} uptime: {}s", uptime.as_secs()),
            None => format!("{bot_id} is not running"),
        }
    }

    async fn logs(&self, bot_id: &str) -> String {
        let Some(worker) = self.supervisor.get(bot_id).await else {
            return FleetError::NotFound(bot_id.to_string()).to_string();
        };
        let lines = worker.log_lines().await;
        if lines.is_empty() {
            return format!("{bot_id}: no log lines yet");
        }
        let tail: Vec<&String> = lines.iter().rev().take(20).collect();
        tail.into_iter().rev().cloned().collect::<Vec<_>>().join("\n")
    }

    /// `/addbot`: validate the token against the chat API before
    /// registering and persisting it (spec §4.8).
    async fn add_bot(&self, token: String) -> String {
        let probe = TelegramChatApi::new(&token);
        if let Err(e) = probe.get_me().await {
            return format!("token rejected by the chat API: {e}");
        }

        match self.supervisor.add_bot(token).await {
            Ok(bot_id) => {
                let tokens = self.supervisor.all_tokens().await;
                if let Err(e) = persist::persist_tokens(&self.supervisor.config.env_file, &tokens) {
                    warn!(error = %e, "failed to persist new token list");
                    return format!("{bot_id} started but failed to persist: {e}");
                }
                format!("{bot_id} added and started")
            }
            Err(e) => e.to_string(),
        }
    }

    /// `/removebot`: stop, forget, and persist the shrunk token list
    /// (spec §3 `WorkerProcess`: "destroyed on `removebot`").
    async fn remove_bot(&self, bot_id: &str) -> String {
        match self.supervisor.remove_bot(bot_id).await {
            Ok(()) => {
                let tokens = self.supervisor.all_tokens().await;
                if let Err(e) = persist::persist_tokens(&self.supervisor.config.env_file, &tokens) {
                    warn!(error = %e, "failed to persist token list after removebot");
                    return format!("{bot_id} removed but failed to persist: {e}");
                }
                format!("{bot_id} removed")
            }
            Err(e) => e.to_string(),
        }
    }

    /// `/reload`: re-read the persisted token list and reconcile the
    /// running fleet against it (spec §4.8 token-list reconciliation).
    async fn reload(&self) -> String {
        let file = match persist::EnvFile::load(&self.supervisor.config.env_file) {
            Ok(file) => file,
            Err(e) => return format!("failed to reload {}: {e}", self.supervisor.config.env_file.display()),
        };
        let tokens: Vec<String> = file.get("TELEGRAM_BOT_TOKENS").map(|v| v.split(',').map(str::to_string).collect()).unwrap_or_default();
        self.supervisor.reconcile_tokens(&tokens).await;
        format!("reloaded {} tokens", tokens.len())
    }
}

#[cfg(test)]
#[path = "control_bot_tests.rs"]
mod tests;
