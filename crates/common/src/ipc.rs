// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor <-> worker IPC: tagged-union envelopes (spec §3 `IPCMessage`)
//! over a length-delimited byte stream on the child's stdin/stdout pipes
//! (spec §6, redesign strategy in spec §9).

use bytes::{Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

/// One IPC envelope exchanged between a worker and the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IpcEnvelope {
    pub bot_id: String,
    pub timestamp_ms: u64,
    pub message: IpcMessage,
}

/// Direction matrix (spec §6): supervisor -> worker: `Shutdown`,
/// `HealthCheck`. worker -> supervisor: everything else.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IpcMessage {
    Ready,
    HealthCheck,
    HealthResponse { uptime_secs: u64, mem_bytes: u64 },
    Shutdown,
    StatusUpdate { status: String },
    LogMessage { level: String, text: String },
    BotInfo { full_name: String, username: String },
    Error { text: String },
}

impl IpcEnvelope {
    pub fn new(bot_id: impl Into<String>, timestamp_ms: u64, message: IpcMessage) -> Self {
        Self { bot_id: bot_id.into(), timestamp_ms, message }
    }
}

/// Writes length-delimited JSON-encoded [`IpcEnvelope`]s onto an
/// `AsyncWrite` (a child's stdin, from the supervisor; stdout, from a
/// worker).
pub struct IpcWriter<W> {
    framed: FramedWrite<W, LengthDelimitedCodec>,
}

impl<W: AsyncWrite + Unpin> IpcWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { framed: FramedWrite::new(writer, LengthDelimitedCodec::new()) }
    }

    pub async fn send(&mut self, envelope: &IpcEnvelope) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec(envelope)?;
        self.framed.send(Bytes::from(bytes)).await?;
        Ok(())
    }
}

/// Reads length-delimited JSON-encoded [`IpcEnvelope`]s from an
/// `AsyncRead`.
pub struct IpcReader<R> {
    framed: FramedRead<R, LengthDelimitedCodec>,
}

impl<R: AsyncRead + Unpin> IpcReader<R> {
    pub fn new(reader: R) -> Self {
        Self { framed: FramedRead::new(reader, LengthDelimitedCodec::new()) }
    }

    /// Read the next envelope. Returns `Ok(None)` on a clean stream close.
    pub async fn recv(&mut self) -> anyhow::Result<Option<IpcEnvelope>> {
        match self.framed.next().await {
            Some(frame) => {
                let frame: BytesMut = frame?;
                let envelope: IpcEnvelope = serde_json::from_slice(&frame)?;
                Ok(Some(envelope))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
#[path = "ipc_tests.rs"]
mod tests;
