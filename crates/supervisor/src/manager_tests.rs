// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::Parser;

fn test_config(tokens: &[&str]) -> Arc<Config> {
    let tokens_arg = tokens.join(",");
    Arc::new(
        Config::parse_from([
            "fleet-supervisor",
            "--tokens",
            &tokens_arg,
            "--allowed-user-ids",
            "1",
        ]),
    )
}

#[tokio::test]
async fn fresh_supervisor_has_no_bots() {
    let supervisor = Supervisor::new(test_config(&["t0"]), CancellationToken::new());
    assert_eq!(supervisor.bot_count().await, 0);
    assert!(supervisor.list().await.is_empty());
}

#[tokio::test]
async fn list_returns_snapshots_in_registration_order() {
    let supervisor = Supervisor::new(test_config(&["t0", "t1"]), CancellationToken::new());
    {
        let mut workers = supervisor.workers.write().await;
        workers.insert("bot-0".to_string(), WorkerProcess::new("bot-0".to_string(), "t0".to_string()));
        workers.insert("bot-1".to_string(), WorkerProcess::new("bot-1".to_string(), "t1".to_string()));
    }
    let snapshots = supervisor.list().await;
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].bot_id, "bot-0");
    assert_eq!(snapshots[1].bot_id, "bot-1");
}

#[tokio::test]
async fn stop_bot_on_unknown_bot_reports_not_found() {
    let supervisor = Supervisor::new(test_config(&["t0"]), CancellationToken::new());
    let err = supervisor.stop_bot("bot-7").await.unwrap_err();
    assert_eq!(err, FleetError::NotFound("bot-7".to_string()));
}

#[tokio::test]
async fn remove_bot_drops_it_from_the_registry() {
    let supervisor = Supervisor::new(test_config(&["t0"]), CancellationToken::new());
    supervisor.workers.write().await.insert("bot-0".to_string(), WorkerProcess::new("bot-0".to_string(), "t0".to_string()));
    supervisor.remove_bot("bot-0").await.expect("remove succeeds for a stopped worker");
    assert_eq!(supervisor.bot_count().await, 0);
}

#[tokio::test]
async fn health_check_on_unknown_bot_reports_not_found() {
    let supervisor = Supervisor::new(test_config(&["t0"]), CancellationToken::new());
    let err = supervisor.health_check("ghost").await.unwrap_err();
    assert_eq!(err, FleetError::NotFound("ghost".to_string()));
}

#[tokio::test]
async fn fleet_error_display_matches_admin_facing_text() {
    assert_eq!(FleetError::NotFound("bot-2".into()).to_string(), "no bot named bot-2");
    assert_eq!(FleetError::AlreadyExists("bot-2".into()).to_string(), "bot-2 already registered");
}
