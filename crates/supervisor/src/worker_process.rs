// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One supervisor-side record per forked worker (spec §3 `WorkerProcess`,
//! spec §4.8): owns the child handle, the IPC pipes, and a bounded ring of
//! recent log lines.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fleet_common::config::mask_token;
use fleet_common::ipc::{IpcEnvelope, IpcMessage, IpcReader, IpcWriter};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{mpsc, oneshot, Mutex, Notify, RwLock};
use tracing::{debug, info, warn};

/// Worker lifecycle states (spec §4.8: `stopped -> starting -> running ->
/// stopping -> stopped`, and `-> error`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

/// Point-in-time copy of a [`WorkerProcess`]'s state, for `/status` and
/// reconciliation reads. Never holds a lock.
#[derive(Debug, Clone)]
pub struct WorkerSnapshot {
    pub bot_id: String,
    pub masked_token: String,
    pub os_pid: Option<u32>,
    pub status: WorkerStatus,
    pub uptime: Option<Duration>,
    pub last_error: Option<String>,
}

const RING_LOG_CAPACITY: usize = 100;
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Exit notification delivered to the supervisor's reconciliation loop
/// when a worker's child process terminates on its own (spec §4.8
/// auto-restart).
pub struct WorkerExited {
    pub bot_id: String,
    pub code: Option<i32>,
    /// Set when the worker told the supervisor, over IPC, that this exit
    /// is its own intentional choice (spec §8 scenario 6: an auto-kill
    /// exit is non-zero but must not trigger an auto-restart). Unlike the
    /// exit code, this can't be confused with an ordinary crash.
    pub self_initiated: bool,
}

struct MutableState {
    status: WorkerStatus,
    os_pid: Option<u32>,
    start_time: Option<Instant>,
    last_error: Option<String>,
    self_initiated_stop: bool,
}

/// A single forked worker and everything needed to talk to it.
pub struct WorkerProcess {
    pub bot_id: String,
    token: RwLock<String>,
    state: RwLock<MutableState>,
    ring_log: Mutex<VecDeque<String>>,
    child: Mutex<Option<Child>>,
    stdin: Mutex<Option<IpcWriter<ChildStdin>>>,
    ready: Notify,
    health_waiters: Mutex<Vec<oneshot::Sender<(u64, u64)>>>,
    generation: AtomicU32,
}

impl WorkerProcess {
    pub fn new(bot_id: String, token: String) -> Arc<Self> {
        Arc::new(Self {
            bot_id,
            token: RwLock::new(token),
            state: RwLock::new(MutableState {
                status: WorkerStatus::Stopped,
                os_pid: None,
                start_time: None,
                last_error: None,
                self_initiated_stop: false,
            }),
            ring_log: Mutex::new(VecDeque::with_capacity(RING_LOG_CAPACITY)),
            child: Mutex::new(None),
            stdin: Mutex::new(None),
            ready: Notify::new(),
            health_waiters: Mutex::new(Vec::new()),
            generation: AtomicU32::new(0),
        })
    }

    pub async fn current_token(&self) -> String {
        self.token.read().await.clone()
    }

    pub async fn set_token(&self, token: String) {
        *self.token.write().await = token;
    }

    pub async fn snapshot(&self) -> WorkerSnapshot {
        let state = self.state.read().await;
        WorkerSnapshot {
            bot_id: self.bot_id.clone(),
            masked_token: mask_token(&self.token.read().await),
            os_pid: state.os_pid,
            status: state.status,
            uptime: state.start_time.map(|t| t.elapsed()),
            last_error: state.last_error.clone(),
        }
    }

    async fn push_log(&self, line: String, verbose_logging: bool) {
        if verbose_logging {
            info!(bot_id = %self.bot_id, "{line}");
        }
        let mut ring = self.ring_log.lock().await;
        if ring.len() >= RING_LOG_CAPACITY {
            ring.pop_front();
        }
        ring.push_back(line);
    }

    /// Snapshot of the ring log, oldest first.
    pub async fn log_lines(&self) -> Vec<String> {
        self.ring_log.lock().await.iter().cloned().collect()
    }

    /// Fork the worker binary with `BOT_TOKEN`/`BOT_INDEX` set, wire up
    /// IPC over its stdin/stdout, and drain its stderr into the ring log.
    /// Returns once the child has been spawned; callers await
    /// [`WorkerProcess::wait_ready`] separately to learn `running` vs
    /// `error`.
    pub async fn start(self: &Arc<Self>, worker_binary: &std::path::Path, bot_index: usize, verbose_logging: bool, exits: mpsc::Sender<WorkerExited>) -> anyhow::Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.write().await;
            state.status = WorkerStatus::Starting;
            state.last_error = None;
            state.self_initiated_stop = false;
        }

        let token = self.current_token().await;
        let mut command = tokio::process::Command::new(worker_binary);
        command
            .env("BOT_TOKEN", &token)
            .env("BOT_INDEX", bot_index.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let spawned = command
            .spawn()
            .map_err(anyhow::Error::from)
            .and_then(|mut child| {
                let stdin = child.stdin.take().ok_or_else(|| anyhow::anyhow!("worker child missing piped stdin"))?;
                let stdout = child.stdout.take().ok_or_else(|| anyhow::anyhow!("worker child missing piped stdout"))?;
                let stderr = child.stderr.take().ok_or_else(|| anyhow::anyhow!("worker child missing piped stderr"))?;
                Ok((child, stdin, stdout, stderr))
            });
        let (mut child, stdin, stdout, stderr) = match spawned {
            Ok(parts) => parts,
            Err(e) => {
                let mut state = self.state.write().await;
                state.status = WorkerStatus::Error;
                state.last_error = Some(e.to_string());
                return Err(e);
            }
        };
        let pid = child.id();

        {
            let mut state = self.state.write().await;
            state.os_pid = pid;
            state.start_time = Some(Instant::now());
        }
        *self.stdin.lock().await = Some(IpcWriter::new(stdin));
        *self.child.lock().await = Some(child);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_stderr_reader(stderr, verbose_logging).await;
        });

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_ipc_reader(stdout).await;
        });

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_exit_watcher(generation, exits).await;
        });

        Ok(())
    }

    async fn run_stderr_reader(self: Arc<Self>, stderr: tokio::process::ChildStderr, verbose_logging: bool) {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            self.push_log(line, verbose_logging).await;
        }
    }

    async fn run_ipc_reader(self: Arc<Self>, stdout: tokio::process::ChildStdout) {
        let mut reader = IpcReader::new(stdout);
        loop {
            match reader.recv().await {
                Ok(Some(envelope)) => self.handle_envelope(envelope).await,
                Ok(None) => break,
                Err(e) => {
                    debug!(bot_id = %self.bot_id, error = %e, "IPC read error from worker");
                    break;
                }
            }
        }
    }

    async fn handle_envelope(&self, envelope: IpcEnvelope) {
        match envelope.message {
            IpcMessage::Ready => {
                let mut state = self.state.write().await;
                state.status = WorkerStatus::Running;
                drop(state);
                self.ready.notify_waiters();
                info!(bot_id = %self.bot_id, "worker reported ready");
            }
            IpcMessage::HealthResponse { uptime_secs, mem_bytes } => {
                let mut waiters = self.health_waiters.lock().await;
                for tx in waiters.drain(..) {
                    let _ = tx.send((uptime_secs, mem_bytes));
                }
            }
            IpcMessage::BotInfo { full_name, username } => {
                info!(bot_id = %self.bot_id, %full_name, %username, "worker bot identity");
            }
            IpcMessage::StatusUpdate { status } => {
                if status == "auto_kill" {
                    self.state.write().await.self_initiated_stop = true;
                }
                self.push_log(format!("status: {status}"), false).await;
            }
            IpcMessage::LogMessage { level, text } => {
                self.push_log(format!("[{level}] {text}"), false).await;
            }
            IpcMessage::Error { text } => {
                self.state.write().await.last_error = Some(text.clone());
                self.push_log(format!("[error] {text}"), false).await;
            }
            // Supervisor -> worker only; a worker never sends these.
            IpcMessage::HealthCheck | IpcMessage::Shutdown => {}
        }
    }

    /// Wait until `READY` arrives or `timeout` elapses. Spec §4.8: a
    /// worker that doesn't send `READY` within the window is left in
    /// `stopped`/`error`.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        if matches!(self.state.read().await.status, WorkerStatus::Running) {
            return true;
        }
        tokio::time::timeout(timeout, self.ready.notified()).await.is_ok()
    }

    async fn run_exit_watcher(self: Arc<Self>, generation: u32, exits: mpsc::Sender<WorkerExited>) {
        let status = {
            let mut guard = self.child.lock().await;
            match guard.as_mut() {
                Some(child) => child.wait().await.ok(),
                None => None,
            }
        };
        *self.child.lock().await = None;
        *self.stdin.lock().await = None;

        // A restart bumped the generation before this child exited; the
        // exit belongs to a process this supervisor no longer tracks.
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }

        let (was_stopping, self_initiated) = {
            let mut state = self.state.write().await;
            let was_stopping = matches!(state.status, WorkerStatus::Stopping);
            let self_initiated = state.self_initiated_stop;
            state.status = if was_stopping || self_initiated || status.as_ref().map(|s| s.success()).unwrap_or(false) {
                WorkerStatus::Stopped
            } else {
                WorkerStatus::Error
            };
            state.os_pid = None;
            if !was_stopping && !self_initiated {
                state.last_error = Some(
                    status.map(|s| format!("exited with {s}")).unwrap_or_else(|| "wait() failed".to_string()),
                );
            }
            (was_stopping, self_initiated)
        };

        let code = status.and_then(|s| s.code());
        warn!(bot_id = %self.bot_id, ?code, was_stopping, self_initiated, "worker process exited");
        let _ = exits.send(WorkerExited { bot_id: self.bot_id.clone(), code, self_initiated }).await;
    }

    /// Send `SHUTDOWN` and mark `stopping`. The exit watcher transitions
    /// to `stopped` once the child actually exits.
    pub async fn request_shutdown(&self) -> anyhow::Result<()> {
        self.state.write().await.status = WorkerStatus::Stopping;
        self.send(IpcMessage::Shutdown).await
    }

    /// Send `SIGKILL` directly; used when a worker ignores `SHUTDOWN`.
    pub async fn kill(&self) -> anyhow::Result<()> {
        if let Some(child) = self.child.lock().await.as_mut() {
            child.start_kill()?;
        }
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.child.lock().await.is_some()
    }

    async fn send(&self, message: IpcMessage) -> anyhow::Result<()> {
        let mut guard = self.stdin.lock().await;
        let Some(writer) = guard.as_mut() else {
            anyhow::bail!("worker {} has no open stdin", self.bot_id);
        };
        let envelope = IpcEnvelope::new(self.bot_id.clone(), now_ms(), message);
        writer.send(&envelope).await
    }

    /// Send `HEALTH_CHECK` and resolve `true` if `HEALTH_RESPONSE` arrives
    /// within the 5s budget (spec §4.8 `healthCheck`).
    pub async fn health_check(&self) -> bool {
        let (tx, rx) = oneshot::channel();
        self.health_waiters.lock().await.push(tx);
        if self.send(IpcMessage::HealthCheck).await.is_err() {
            return false;
        }
        tokio::time::timeout(HEALTH_CHECK_TIMEOUT, rx).await.is_ok_and(|r| r.is_ok())
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

#[cfg(test)]
#[path = "worker_process_tests.rs"]
mod tests;
