// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervisor half of the fleet runtime (spec §4.8/§4.9): forks one
//! worker process per bot credential, restarts failed ones, persists
//! admin-driven configuration changes, and exposes an admin `ControlBot`
//! over the same chat-API trait the workers use.

pub mod control_bot;
pub mod gate;
pub mod manager;
pub mod persist;
pub mod worker_process;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use fleet_common::config::Config;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::control_bot::ControlBot;
use crate::manager::Supervisor;

/// Bootstrap and run the supervisor until it is asked to shut down
/// (spec §4.8). Forks every configured worker, starts the optional
/// token-reconciliation timer, and — if `controlBotToken` is set — runs
/// the admin `ControlBot` loop on the current task until `shutdown`
/// fires or the process receives SIGINT/SIGTERM.
pub async fn run(config: Config) -> anyhow::Result<()> {
    config.validate()?;
    fleet_common::telegram::ensure_crypto();

    let config = Arc::new(config);
    let shutdown = CancellationToken::new();
    let supervisor = Supervisor::new(Arc::clone(&config), shutdown.clone());

    let reconciliation = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run_reconciliation_loop().await })
    };

    supervisor.start_all().await;
    supervisor.spawn_token_monitor();

    let control_bot_loop = if let Some(token) = config.control_bot_token.clone() {
        let control_bot = ControlBot::new(Arc::clone(&supervisor), &token);
        Some(tokio::spawn(async move { control_bot.run().await }))
    } else {
        info!("no CONTROL_BOT_TOKEN configured; admin control bot disabled");
        None
    };

    wait_for_shutdown_signal(&shutdown).await;

    info!("supervisor shutting down: stopping all workers");
    supervisor.stop_all().await;
    if let Some(handle) = control_bot_loop {
        handle.abort();
    }
    reconciliation.abort();

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal(shutdown: &CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(_) => {
            shutdown.cancelled().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal(shutdown: &CancellationToken) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
