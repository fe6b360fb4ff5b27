// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor (spec §4.8): forks one worker per bot credential, restarts
//! failed ones, and answers `healthCheck` probes. `ControlBot` (spec §4.8
//! admin interface) drives this through the same public operations a
//! reconciliation timer or a crash would.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fleet_common::config::Config;
use indexmap::IndexMap;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::worker_process::{WorkerExited, WorkerProcess, WorkerSnapshot};

const START_TIMEOUT: Duration = Duration::from_secs(5);
const STOP_TIMEOUT: Duration = Duration::from_secs(10);
const RESTART_DELAY: Duration = Duration::from_secs(1);
const AUTO_RESTART_DELAY: Duration = Duration::from_secs(5);

/// Error returned by a fleet operation that a `ControlBot` command needs
/// to report back to the admin verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetError {
    NotFound(String),
    AlreadyExists(String),
    Spawn(String),
}

impl std::fmt::Display for FleetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(bot_id) => write!(f, "no bot named {bot_id}"),
            Self::AlreadyExists(bot_id) => write!(f, "bot {bot_id} already registered"),
            Self::Spawn(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for FleetError {}

/// Owns every [`WorkerProcess`] and the fork/restart policy around them.
pub struct Supervisor {
    pub config: Arc<Config>,
    worker_binary: PathBuf,
    workers: RwLock<IndexMap<String, Arc<WorkerProcess>>>,
    pub shutdown: CancellationToken,
    exits_tx: mpsc::Sender<WorkerExited>,
    exits_rx: tokio::sync::Mutex<Option<mpsc::Receiver<WorkerExited>>>,
    shutting_down_bots: RwLock<std::collections::HashSet<String>>,
}

impl Supervisor {
    pub fn new(config: Arc<Config>, shutdown: CancellationToken) -> Arc<Self> {
        let worker_binary = config.worker_binary.clone().unwrap_or_else(|| default_worker_binary_path());
        let (exits_tx, exits_rx) = mpsc::channel(64);
        Arc::new(Self {
            config,
            worker_binary,
            workers: RwLock::new(IndexMap::new()),
            shutdown,
            exits_tx,
            exits_rx: tokio::sync::Mutex::new(Some(exits_rx)),
            shutting_down_bots: RwLock::new(std::collections::HashSet::new()),
        })
    }

    /// Fork a worker for every `(botId, token)` the configuration carries,
    /// in order.
    pub async fn start_all(self: &Arc<Self>) {
        let tokens: Vec<String> = self.config.tokens.clone();
        for (index, token) in tokens.into_iter().enumerate() {
            let bot_id = Config::bot_id(index);
            if let Err(e) = self.start_bot(&bot_id, index, token).await {
                warn!(bot_id = %bot_id, error = %e, "initial worker start failed");
            }
        }
    }

    /// Number of bots currently registered (running or not).
    pub async fn bot_count(&self) -> usize {
        self.workers.read().await.len()
    }

    /// Snapshots of every registered worker, in fork order.
    pub async fn list(&self) -> Vec<WorkerSnapshot> {
        let workers = self.workers.read().await;
        let mut out = Vec::with_capacity(workers.len());
        for worker in workers.values() {
            out.push(worker.snapshot().await);
        }
        out
    }

    pub async fn get(&self, bot_id: &str) -> Option<Arc<WorkerProcess>> {
        self.workers.read().await.get(bot_id).cloned()
    }

    /// Current tokens for every registered bot, in fork order — the
    /// source of truth `/addbot`/`/removebot` persist back to the
    /// environment file (spec §4.9).
    pub async fn all_tokens(&self) -> Vec<String> {
        let workers = self.workers.read().await;
        let mut tokens = Vec::with_capacity(workers.len());
        for worker in workers.values() {
            tokens.push(worker.current_token().await);
        }
        tokens
    }

    async fn index_of(&self, bot_id: &str) -> Option<usize> {
        self.workers.read().await.get_index_of(bot_id)
    }

    /// `startBot` (spec §4.8): fork, wait up to 5s for `READY`.
    pub async fn start_bot(self: &Arc<Self>, bot_id: &str, index: usize, token: String) -> anyhow::Result<()> {
        let worker = {
            let mut workers = self.workers.write().await;
            match workers.get(bot_id) {
                Some(existing) => Arc::clone(existing),
                None => {
                    let worker = WorkerProcess::new(bot_id.to_string(), token.clone());
                    workers.insert(bot_id.to_string(), Arc::clone(&worker));
                    worker
                }
            }
        };
        worker.set_token(token).await;
        self.shutting_down_bots.write().await.remove(bot_id);

        worker.start(&self.worker_binary, index, self.config.verbose_logging, self.exits_tx.clone()).await?;
        if worker.wait_ready(START_TIMEOUT).await {
            info!(bot_id, "worker started");
        } else {
            warn!(bot_id, "worker did not send READY within the startup window");
        }
        Ok(())
    }

    /// `stopBot` (spec §4.8): `SHUTDOWN`, wait up to 10s, else `SIGKILL`.
    pub async fn stop_bot(&self, bot_id: &str) -> Result<(), FleetError> {
        let worker = self.get(bot_id).await.ok_or_else(|| FleetError::NotFound(bot_id.to_string()))?;
        self.shutting_down_bots.write().await.insert(bot_id.to_string());

        if !worker.is_running().await {
            return Ok(());
        }

        let _ = worker.request_shutdown().await;
        let deadline = tokio::time::sleep(STOP_TIMEOUT);
        tokio::pin!(deadline);
        loop {
            if !worker.is_running().await {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(200)) => {}
                _ = &mut deadline => {
                    warn!(bot_id, "worker did not exit within the stop window, sending SIGKILL");
                    let _ = worker.kill().await;
                    break;
                }
            }
        }
        Ok(())
    }

    /// `restartBot` (spec §4.8): stop, wait at least 1s, start with the
    /// same token.
    pub async fn restart_bot(self: &Arc<Self>, bot_id: &str) -> Result<(), FleetError> {
        let worker = self.get(bot_id).await.ok_or_else(|| FleetError::NotFound(bot_id.to_string()))?;
        let token = worker.current_token().await;
        let index = self.index_of(bot_id).await.unwrap_or(0);
        self.stop_bot(bot_id).await?;
        tokio::time::sleep(RESTART_DELAY).await;
        self.start_bot(bot_id, index, token).await.map_err(|e| FleetError::Spawn(e.to_string()))
    }

    pub async fn stop_all(&self) {
        let bot_ids: Vec<String> = self.workers.read().await.keys().cloned().collect();
        for bot_id in bot_ids {
            let _ = self.stop_bot(&bot_id).await;
        }
    }

    pub async fn start_all_stopped(self: &Arc<Self>) {
        let entries: Vec<(String, usize, String)> = {
            let workers = self.workers.read().await;
            let mut out = Vec::new();
            for (index, (bot_id, worker)) in workers.iter().enumerate() {
                if !worker.is_running().await {
                    out.push((bot_id.clone(), index, worker.current_token().await));
                }
            }
            out
        };
        for (bot_id, index, token) in entries {
            let _ = self.start_bot(&bot_id, index, token).await;
        }
    }

    pub async fn restart_all(self: &Arc<Self>) {
        let bot_ids: Vec<String> = self.workers.read().await.keys().cloned().collect();
        for bot_id in bot_ids {
            let _ = self.restart_bot(&bot_id).await;
        }
    }

    /// Validate a candidate token against the chat API, then register a
    /// new worker and fork it (spec §4.8 `/addbot`: "must validate the
    /// token against the chat API before persisting").
    pub async fn add_bot(self: &Arc<Self>, token: String) -> Result<String, FleetError> {
        let index = self.bot_count().await;
        let bot_id = Config::bot_id(index);
        if self.workers.read().await.contains_key(&bot_id) {
            return Err(FleetError::AlreadyExists(bot_id));
        }
        self.start_bot(&bot_id, index, token).await.map_err(|e| FleetError::Spawn(e.to_string()))?;
        Ok(bot_id)
    }

    /// Stop and forget a worker entirely (spec §3 `WorkerProcess`:
    /// "destroyed on `removebot`").
    pub async fn remove_bot(&self, bot_id: &str) -> Result<(), FleetError> {
        self.stop_bot(bot_id).await?;
        self.workers.write().await.shift_remove(bot_id);
        Ok(())
    }

    pub async fn health_check(&self, bot_id: &str) -> Result<bool, FleetError> {
        let worker = self.get(bot_id).await.ok_or_else(|| FleetError::NotFound(bot_id.to_string()))?;
        Ok(worker.health_check().await)
    }

    /// Drive the auto-restart policy (spec §4.8): a running worker that
    /// exits non-zero, outside of an explicit `stopBot`/shutdown, is
    /// re-spawned once after a 5s delay. Runs until `shutdown` fires.
    pub async fn run_reconciliation_loop(self: &Arc<Self>) {
        let mut rx = match self.exits_rx.lock().await.take() {
            Some(rx) => rx,
            None => return,
        };
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                exited = rx.recv() => {
                    let Some(exited) = exited else { return };
                    self.handle_exit(exited).await;
                }
            }
        }
    }

    async fn handle_exit(self: &Arc<Self>, exited: WorkerExited) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let was_explicit_stop = self.shutting_down_bots.write().await.remove(&exited.bot_id);
        if was_explicit_stop || exited.self_initiated {
            return;
        }
        let clean_exit = exited.code == Some(0);
        if clean_exit {
            return;
        }

        let Some(index) = self.index_of(&exited.bot_id).await else { return };
        let Some(worker) = self.get(&exited.bot_id).await else { return };
        let token = worker.current_token().await;

        warn!(bot_id = %exited.bot_id, code = ?exited.code, "auto-restarting crashed worker in 5s");
        let supervisor = Arc::clone(self);
        let bot_id = exited.bot_id.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = supervisor.shutdown.cancelled() => {}
                _ = tokio::time::sleep(AUTO_RESTART_DELAY) => {
                    if let Err(e) = supervisor.start_bot(&bot_id, index, token).await {
                        warn!(bot_id, error = %e, "auto-restart failed");
                    }
                }
            }
        });
    }

    /// Token-list reconciliation (spec §4.8, optional): diff `tokens`
    /// against the currently-registered bots; stop vanished ones, start
    /// new ones.
    pub async fn reconcile_tokens(self: &Arc<Self>, tokens: &[String]) {
        let current: Vec<String> = self.workers.read().await.keys().cloned().collect();
        for (index, token) in tokens.iter().enumerate() {
            let bot_id = Config::bot_id(index);
            if !current.contains(&bot_id) {
                info!(bot_id, "reconciliation: starting newly configured bot");
                let _ = self.start_bot(&bot_id, index, token.clone()).await;
            }
        }
        for (index, bot_id) in current.iter().enumerate() {
            if index >= tokens.len() {
                info!(bot_id, "reconciliation: stopping bot removed from token list");
                let _ = self.remove_bot(bot_id).await;
            }
        }
    }

    /// Spawn the optional token-list reconciliation timer (spec §4.8:
    /// off by default, `BOT_TOKEN_MONITOR_INTERVAL=0` disables it).
    pub fn spawn_token_monitor(self: &Arc<Self>) {
        if self.config.token_monitor_interval_ms == 0 {
            return;
        }
        let supervisor = Arc::clone(self);
        let interval = Duration::from_millis(self.config.token_monitor_interval_ms);
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            timer.tick().await;
            loop {
                tokio::select! {
                    _ = supervisor.shutdown.cancelled() => return,
                    _ = timer.tick() => {
                        supervisor.reconcile_tokens(&supervisor.config.tokens).await;
                    }
                }
            }
        });
    }
}

fn default_worker_binary_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("fleet-worker")))
        .unwrap_or_else(|| PathBuf::from("fleet-worker"))
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
