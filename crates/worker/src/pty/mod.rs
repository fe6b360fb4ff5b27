// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The PTY primitive as a narrow external-collaborator trait (spec §1,
//! §4.1): spawn, write, read data events, resize, kill. [`spawn::NativePty`]
//! is the one concrete, in-process adaptation — no other process can
//! stand in for a real PTY.

pub mod nbio;
pub mod spawn;

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

/// How a PTY child exited.
#[derive(Debug, Clone, Copy)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// A running PTY, driving a shell with terminal semantics.
pub trait PtyBackend: Send + 'static {
    /// Run the PTY's I/O loop: forward writes from `input_rx`, push reads
    /// onto `output_tx`, and apply size changes from `resize_rx`. Resize
    /// requests are routed through a channel (rather than a `&self`
    /// method called concurrently from outside) so the run loop remains
    /// the sole owner of the backend for its whole lifetime. Resolves
    /// with the child's exit status once the PTY closes.
    fn run(
        &mut self,
        output_tx: mpsc::Sender<Bytes>,
        input_rx: mpsc::Receiver<Bytes>,
        resize_rx: mpsc::Receiver<(u16, u16)>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ExitStatus>> + Send + '_>>;

    /// Apply a size change. Only called before `run` has taken ownership
    /// of the backend (the initial size) — afterwards, callers must send
    /// on the `resize_rx` channel passed to `run` instead.
    fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()>;

    fn child_pid(&self) -> Option<u32>;
}
