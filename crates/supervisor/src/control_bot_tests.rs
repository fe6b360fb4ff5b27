// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use fleet_common::chat::{ChatId, IncomingMessage, UserId};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::manager::Supervisor;
use crate::test_support::FakeChatApi;
use crate::worker_process::{WorkerSnapshot, WorkerStatus};

fn test_config(admin_ids: &[i64]) -> Arc<fleet_common::config::Config> {
    let ids = admin_ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
    Arc::new(fleet_common::config::Config::parse_from([
        "fleet-supervisor",
        "--tokens",
        "t0",
        "--allowed-user-ids",
        "1",
        "--control-admin-ids",
        &ids,
    ]))
}

fn control_bot_with(admin_ids: &[i64]) -> (ControlBot, Arc<FakeChatApi>) {
    let supervisor = Supervisor::new(test_config(admin_ids), CancellationToken::new());
    let fake = Arc::new(FakeChatApi::new());
    let bot = ControlBot { supervisor, chat: fake.clone() };
    (bot, fake)
}

#[test]
fn parse_command_covers_every_bare_verb() {
    assert_eq!(parse_command("/status"), ControlCommand::Status);
    assert_eq!(parse_command("/stopall"), ControlCommand::StopAll);
    assert_eq!(parse_command("/startall"), ControlCommand::StartAll);
    assert_eq!(parse_command("/restartall"), ControlCommand::RestartAll);
    assert_eq!(parse_command("/reload"), ControlCommand::Reload);
    assert_eq!(parse_command("/shutdown"), ControlCommand::Shutdown);
    assert_eq!(parse_command("/help"), ControlCommand::Help);
}

#[test]
fn parse_command_extracts_the_bot_id_argument() {
    assert_eq!(parse_command("/start bot-1"), ControlCommand::Start(Some("bot-1".to_string())));
    assert_eq!(parse_command("/stop bot-2"), ControlCommand::Stop(Some("bot-2".to_string())));
    assert_eq!(parse_command("/restart bot-3"), ControlCommand::Restart(Some("bot-3".to_string())));
    assert_eq!(parse_command("/logs bot-4"), ControlCommand::Logs(Some("bot-4".to_string())));
    assert_eq!(parse_command("/health bot-5"), ControlCommand::Health(Some("bot-5".to_string())));
    assert_eq!(parse_command("/uptime bot-6"), ControlCommand::Uptime(Some("bot-6".to_string())));
    assert_eq!(parse_command("/addbot 123:abc"), ControlCommand::AddBot(Some("123:abc".to_string())));
    assert_eq!(parse_command("/removebot bot-1"), ControlCommand::RemoveBot(Some("bot-1".to_string())));
}

#[test]
fn parse_command_treats_bare_argumented_verbs_as_missing_argument() {
    assert_eq!(parse_command("/start"), ControlCommand::Start(None));
    assert_eq!(parse_command("/start   "), ControlCommand::Start(None));
}

#[test]
fn parse_command_rejects_text_with_no_leading_slash() {
    assert_eq!(parse_command("status"), ControlCommand::Unknown);
}

#[test]
fn parse_command_falls_back_to_unknown_for_unrecognised_verbs() {
    assert_eq!(parse_command("/frobnicate"), ControlCommand::Unknown);
}

#[test]
fn parse_callback_splits_action_and_bot_id() {
    assert_eq!(parse_callback("restart:bot-0"), ControlCallback::Restart("bot-0".to_string()));
    assert_eq!(parse_callback("stop:bot-1"), ControlCallback::Stop("bot-1".to_string()));
    assert_eq!(parse_callback("start:bot-2"), ControlCallback::Start("bot-2".to_string()));
    assert_eq!(parse_callback("health:bot-3"), ControlCallback::Health("bot-3".to_string()));
}

#[test]
fn parse_callback_rejects_malformed_data() {
    assert_eq!(parse_callback("restart"), ControlCallback::Unknown);
    assert_eq!(parse_callback("frobnicate:bot-0"), ControlCallback::Unknown);
}

#[test]
fn format_snapshot_includes_masked_token_and_status() {
    let snapshot = WorkerSnapshot {
        bot_id: "bot-0".to_string(),
        masked_token: "***beef".to_string(),
        os_pid: Some(42),
        status: WorkerStatus::Running,
        uptime: Some(Duration::from_secs(90)),
        last_error: None,
    };
    let line = format_snapshot(&snapshot);
    assert!(line.contains("bot-0"));
    assert!(line.contains("***beef"));
    assert!(line.contains("running"));
    assert!(line.contains("pid=42"));
    assert!(line.contains("uptime=90s"));
}

#[tokio::test]
async fn status_reports_no_bots_registered_when_fleet_is_empty() {
    let (bot, _fake) = control_bot_with(&[9]);
    assert_eq!(bot.dispatch(ControlCommand::Status).await, "no bots registered");
}

#[tokio::test]
async fn help_command_returns_the_full_command_list() {
    let (bot, _fake) = control_bot_with(&[9]);
    let reply = bot.dispatch(ControlCommand::Help).await;
    assert!(reply.contains("/status"));
    assert!(reply.contains("/addbot"));
    assert!(reply.contains("/shutdown"));
}

#[tokio::test]
async fn unknown_command_dispatches_to_an_empty_reply() {
    let (bot, _fake) = control_bot_with(&[9]);
    assert_eq!(bot.dispatch(ControlCommand::Unknown).await, "");
}

#[tokio::test]
async fn start_stop_restart_without_an_argument_report_usage() {
    let (bot, _fake) = control_bot_with(&[9]);
    assert_eq!(bot.dispatch(ControlCommand::Start(None)).await, "usage: /start|/stop|/restart <bot-id>");
}

#[tokio::test]
async fn operating_on_an_unknown_bot_reports_not_found() {
    let (bot, _fake) = control_bot_with(&[9]);
    assert_eq!(bot.dispatch(ControlCommand::Uptime(Some("bot-9".to_string()))).await, "no bot named bot-9");
}

#[tokio::test]
async fn a_non_admin_message_is_denied_before_dispatch() {
    let (bot, fake) = control_bot_with(&[9]);
    let msg = IncomingMessage { chat_id: ChatId(1), user_id: Some(UserId(404)), text: Some("/shutdown".to_string()), voice: None, audio: None };
    bot.handle_message(msg).await;
    assert!(!bot.supervisor.shutdown.is_cancelled());
    assert_eq!(fake.calls().len(), 1);
}

#[tokio::test]
async fn an_admin_message_passes_the_gate_and_is_dispatched() {
    let (bot, fake) = control_bot_with(&[9]);
    let msg = IncomingMessage { chat_id: ChatId(1), user_id: Some(UserId(9)), text: Some("/help".to_string()), voice: None, audio: None };
    bot.handle_message(msg).await;
    let calls = fake.calls();
    assert_eq!(calls.len(), 1);
    match &calls[0] {
        crate::test_support::FakeChatCall::SendMessage(_, text) => assert!(text.contains("/status")),
        other => panic!("unexpected call: {other:?}"),
    }
}
