// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY Session Manager (spec §4.1): owns the `userId -> PtySession` map
//! for this worker's bot, ring-buffers output, and sweeps idle sessions.
//!
//! One worker process serves exactly one bot credential (spec §1), so the
//! spec's `(botId,userId)` key collapses to `userId` here — the bot id is
//! constant for the process's lifetime.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fleet_common::chat::{ChatId, MessageId, UserId};
use fleet_common::ring::ChunkRing;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::pty::spawn::NativePty;
use crate::pty::PtyBackend;
use crate::refresh::AutoRefreshController;

/// Failure modes for session operations (spec §4.1, mapped to
/// [`fleet_common::error::ErrorCode`] by the dispatcher).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    AlreadyExists,
    NotFound,
    SpawnFailed,
}

/// Callbacks fired by the session's data sink on every PTY output chunk
/// (spec §4.1, redesigned per §9 as a single fan-out point rather than a
/// list of independently-registered observers).
#[derive(Clone, Default)]
pub struct SessionCallbacks {
    pub on_data: Option<Arc<dyn Fn(&[u8]) + Send + Sync>>,
    pub on_buffering_ended: Option<Arc<dyn Fn() + Send + Sync>>,
}

/// A single user's PTY session (spec §3 `PtySession`).
pub struct PtySession {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub cols: u16,
    pub rows: u16,
    output: Mutex<ChunkRing>,
    last_activity: Mutex<Instant>,
    input_tx: mpsc::Sender<bytes::Bytes>,
    resize_tx: mpsc::Sender<(u16, u16)>,
    child_pid: Option<u32>,
    pub last_screenshot_msg_id: Mutex<Option<MessageId>>,
    pub last_screenshot_buffer_hash: AtomicU64,
    pub discovered_urls: Mutex<HashSet<String>>,
    pub notified_urls: Mutex<HashSet<String>>,
    /// Rolling detector buffer for the confirmation-prompt trigger (spec
    /// §4.3: last ~500 bytes of emitted PTY output).
    pub(crate) detector_buffer: Mutex<std::collections::VecDeque<u8>>,
    pub(crate) last_confirmation_fired: Mutex<Option<Instant>>,
    /// Cancelled when the session closes; owns every ticker/timer the
    /// session spawned (auto-refresh, URL notification debounce timers).
    pub scope: CancellationToken,
    /// This session's own auto-refresh ticker (spec §4.4). One per
    /// session, not shared, so cancel-replace semantics never cross users.
    pub refresh: AutoRefreshController,
}

impl PtySession {
    /// Write text to the PTY, optionally appending a carriage return.
    pub async fn write(&self, text: &str, append_enter: bool) -> anyhow::Result<()> {
        let mut payload = text.as_bytes().to_vec();
        if append_enter {
            payload.push(b'\r');
        }
        self.write_raw(&payload).await
    }

    /// Write raw bytes to the PTY (spec §4.1 `writeRaw`, used for special
    /// keys and control characters that bypass text substitution).
    pub async fn write_raw(&self, bytes: &[u8]) -> anyhow::Result<()> {
        self.input_tx
            .send(bytes::Bytes::copy_from_slice(bytes))
            .await
            .map_err(|_| anyhow::anyhow!("pty closed"))?;
        *self.last_activity.lock().await = Instant::now();
        Ok(())
    }

    /// An atomic copy of the ring buffer's bytes plus current dimensions.
    pub async fn snapshot(&self) -> (Vec<u8>, u16, u16) {
        let ring = self.output.lock().await;
        (ring.concatenated(), self.cols, self.rows)
    }

    pub async fn idle_for(&self) -> Duration {
        self.last_activity.lock().await.elapsed()
    }

    /// Request a size change. Fire-and-forget: applied by the PTY's own
    /// run loop, not by this call directly (see [`crate::pty::PtyBackend::run`]).
    pub async fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()> {
        self.resize_tx.send((cols, rows)).await.map_err(|_| anyhow::anyhow!("pty closed"))
    }

    pub fn child_pid(&self) -> Option<u32> {
        self.child_pid
    }
}

/// Owns every active session for this worker's bot.
pub struct SessionManager {
    sessions: RwLock<HashMap<UserId, Arc<PtySession>>>,
    shell_path: String,
    rows: u16,
    cols: u16,
    session_timeout: Duration,
    max_output_chunks: usize,
    home_dir: std::path::PathBuf,
    shutdown: CancellationToken,
}

impl SessionManager {
    pub fn new(
        shell_path: String,
        rows: u16,
        cols: u16,
        session_timeout: Duration,
        max_output_chunks: usize,
        home_dir: std::path::PathBuf,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            shell_path,
            rows,
            cols,
            session_timeout,
            max_output_chunks,
            home_dir,
            shutdown,
        });
        manager.clone().spawn_idle_sweeper();
        manager
    }

    /// Spawn a new PTY session for `user_id`. Fails with `AlreadyExists`
    /// if one is already open (spec I1: at most one session per user).
    pub async fn create_session(
        self: &Arc<Self>,
        user_id: UserId,
        chat_id: ChatId,
        callbacks: SessionCallbacks,
    ) -> Result<Arc<PtySession>, SessionError> {
        // Hold the write lock across the has-check and the insert so the
        // two are race-free (spec §4.1: concurrent createSession calls
        // for the same user must not both succeed).
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&user_id) {
            return Err(SessionError::AlreadyExists);
        }

        let pty = NativePty::spawn(&self.shell_path, self.cols, self.rows, &self.home_dir)
            .map_err(|_| SessionError::SpawnFailed)?;
        let child_pid = pty.child_pid();

        let (output_tx, mut output_rx) = mpsc::channel::<bytes::Bytes>(256);
        let (input_tx, input_rx) = mpsc::channel::<bytes::Bytes>(256);
        let (resize_tx, resize_rx) = mpsc::channel::<(u16, u16)>(4);

        let session = Arc::new(PtySession {
            user_id,
            chat_id,
            cols: self.cols,
            rows: self.rows,
            output: Mutex::new(ChunkRing::new(self.max_output_chunks)),
            last_activity: Mutex::new(Instant::now()),
            input_tx,
            resize_tx,
            child_pid,
            last_screenshot_msg_id: Mutex::new(None),
            last_screenshot_buffer_hash: AtomicU64::new(0),
            discovered_urls: Mutex::new(HashSet::new()),
            notified_urls: Mutex::new(HashSet::new()),
            detector_buffer: Mutex::new(std::collections::VecDeque::with_capacity(512)),
            last_confirmation_fired: Mutex::new(None),
            scope: self.shutdown.child_token(),
            refresh: AutoRefreshController::new(),
        });

        sessions.insert(user_id, Arc::clone(&session));
        drop(sessions);

        // The sink task owns the ring buffer writes and fires callbacks;
        // the run task owns the PTY itself end-to-end (spec §4.1: a
        // session's PTY is exclusively owned, never shared).
        let sink_session = Arc::clone(&session);
        tokio::spawn(async move {
            while let Some(chunk) = output_rx.recv().await {
                {
                    let mut ring = sink_session.output.lock().await;
                    ring.push(chunk.clone());
                }
                *sink_session.last_activity.lock().await = Instant::now();
                if let Some(cb) = &callbacks.on_data {
                    cb(&chunk);
                }
            }
            if let Some(cb) = &callbacks.on_buffering_ended {
                cb();
            }
        });

        // On PTY exit the entry is removed with no callback to the
        // dispatcher; the next command simply observes its absence
        // (spec §4.1). `scope.cancelled()` fires on an explicit `/close`
        // or an idle-sweep; the run future is dropped mid-flight and the
        // `NativePty`'s `Drop` impl (SIGHUP, then SIGKILL) reaps the child.
        let exit_manager = Arc::clone(self);
        let exit_scope = session.scope.clone();
        tokio::spawn(async move {
            let mut pty = pty;
            let run_fut = pty.run(output_tx, input_rx, resize_rx);
            tokio::pin!(run_fut);
            tokio::select! {
                _ = exit_scope.cancelled() => {}
                result = &mut run_fut => {
                    match result {
                        Ok(status) => info!(user_id = user_id.0, code = ?status.code, signal = ?status.signal, "pty exited"),
                        Err(e) => warn!(user_id = user_id.0, error = %e, "pty run loop failed"),
                    }
                    exit_manager.sessions.write().await.remove(&user_id);
                }
            }
        });

        Ok(session)
    }

    /// Look up an existing session.
    pub async fn get(&self, user_id: UserId) -> Option<Arc<PtySession>> {
        self.sessions.read().await.get(&user_id).cloned()
    }

    pub async fn exists(&self, user_id: UserId) -> bool {
        self.sessions.read().await.contains_key(&user_id)
    }

    /// Close a session: cancels its scope, which both kills any owned
    /// tickers/timers and interrupts the PTY run task so it drops the
    /// backend (SIGHUP then SIGKILL to the child; see
    /// [`crate::pty::spawn::NativePty`]'s `Drop` impl), then removes the
    /// map entry (spec §4.1).
    pub async fn close(&self, user_id: UserId) -> Result<(), SessionError> {
        let removed = self.sessions.write().await.remove(&user_id);
        match removed {
            Some(session) => {
                session.scope.cancel();
                Ok(())
            }
            None => Err(SessionError::NotFound),
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Background idle sweeper: closes any session idle longer than the
    /// configured timeout. Runs every 60s (spec §4.1, §5).
    fn spawn_idle_sweeper(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(60));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                let stale: Vec<UserId> = {
                    let sessions = self.sessions.read().await;
                    let mut out = Vec::new();
                    for (user_id, session) in sessions.iter() {
                        if session.idle_for().await > self.session_timeout {
                            out.push(*user_id);
                        }
                    }
                    out
                };
                for user_id in stale {
                    if self.close(user_id).await.is_ok() {
                        info!(user_id = user_id.0, "closed idle session");
                    }
                }
            }
        });
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
