// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end supervisor tests: forks the real `fake-worker` fixture as a
//! subprocess and drives it over the real IPC pipes (spec §4.8/§6), with
//! no chat backend involved.

use std::time::Duration;

use clap::Parser;
use fleet_common::config::Config;
use fleet_specs::fake_worker_binary;
use fleet_supervisor::manager::Supervisor;
use tokio_util::sync::CancellationToken;

const READY_TIMEOUT: Duration = Duration::from_secs(5);

fn test_config(tokens: &[&str]) -> std::sync::Arc<Config> {
    let tokens_arg = tokens.join(",");
    let worker_binary = fake_worker_binary();
    std::sync::Arc::new(Config::parse_from([
        "fleet-supervisor",
        "--tokens",
        &tokens_arg,
        "--allowed-user-ids",
        "1",
        "--worker-binary",
        &worker_binary.to_string_lossy(),
    ]))
}

#[tokio::test]
async fn start_bot_forks_a_real_process_and_reaches_running() {
    let supervisor = Supervisor::new(test_config(&["t0"]), CancellationToken::new());
    supervisor.start_bot("bot-0", 0, "t0".to_string()).await.expect("worker forks cleanly");

    let snapshot = supervisor.list().await.into_iter().next().expect("one worker registered");
    assert_eq!(snapshot.bot_id, "bot-0");
    assert_eq!(snapshot.status.as_str(), "running");
    assert!(snapshot.os_pid.is_some());

    supervisor.stop_bot("bot-0").await.expect("stop succeeds");
}

#[tokio::test]
async fn stop_bot_sends_shutdown_and_the_child_exits_cleanly() {
    let supervisor = Supervisor::new(test_config(&["t0"]), CancellationToken::new());
    supervisor.start_bot("bot-0", 0, "t0".to_string()).await.expect("worker forks cleanly");

    supervisor.stop_bot("bot-0").await.expect("stop succeeds");

    let worker = supervisor.get("bot-0").await.expect("worker still registered after stop");
    assert!(!worker.is_running().await);
}

#[tokio::test]
async fn health_check_round_trips_over_ipc() {
    let supervisor = Supervisor::new(test_config(&["t0"]), CancellationToken::new());
    supervisor.start_bot("bot-0", 0, "t0".to_string()).await.expect("worker forks cleanly");

    let healthy = supervisor.health_check("bot-0").await.expect("bot-0 is registered");
    assert!(healthy);

    supervisor.stop_bot("bot-0").await.expect("stop succeeds");
}

#[tokio::test]
async fn health_check_on_an_unregistered_bot_reports_not_found() {
    let supervisor = Supervisor::new(test_config(&["t0"]), CancellationToken::new());
    let err = supervisor.health_check("ghost").await.unwrap_err();
    assert_eq!(err.to_string(), "no bot named ghost");
}

#[tokio::test]
async fn removebot_stops_the_process_and_drops_it_from_the_registry() {
    let supervisor = Supervisor::new(test_config(&["t0"]), CancellationToken::new());
    supervisor.start_bot("bot-0", 0, "t0".to_string()).await.expect("worker forks cleanly");

    supervisor.remove_bot("bot-0").await.expect("remove succeeds");

    assert_eq!(supervisor.bot_count().await, 0);
}

#[tokio::test]
async fn a_crashing_worker_is_auto_restarted_by_the_reconciliation_loop() {
    let supervisor = Supervisor::new(test_config(&["CRASH-ME"]), CancellationToken::new());
    let reconciliation = {
        let supervisor = std::sync::Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run_reconciliation_loop().await })
    };

    supervisor.start_bot("bot-0", 0, "CRASH-ME".to_string()).await.expect("worker forks cleanly");

    // The fixture exits(7) right after READY; give the reconciliation
    // loop its 5s auto-restart delay plus headroom to act on it.
    tokio::time::sleep(Duration::from_secs(7)).await;

    let snapshot = supervisor.list().await.into_iter().next().expect("bot-0 still registered");
    assert_eq!(snapshot.status.as_str(), "starting");

    reconciliation.abort();
    let _ = supervisor.stop_bot("bot-0").await;
}

#[tokio::test]
async fn wait_ready_times_out_quickly_for_a_well_behaved_fixture() {
    let supervisor = Supervisor::new(test_config(&["t0"]), CancellationToken::new());
    supervisor.start_bot("bot-0", 0, "t0".to_string()).await.expect("worker forks cleanly");

    let worker = supervisor.get("bot-0").await.expect("registered");
    assert!(worker.wait_ready(READY_TIMEOUT).await);

    supervisor.stop_bot("bot-0").await.expect("stop succeeds");
}
