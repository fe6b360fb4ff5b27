// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A minimal worker stand-in for supervisor integration tests: speaks the
//! real IPC protocol over real stdin/stdout pipes without touching a chat
//! backend. `BOT_TOKEN=CRASH-ME` exits non-zero right after `READY`, to
//! exercise the supervisor's auto-restart path.

use std::time::Instant;

use fleet_common::ipc::{IpcEnvelope, IpcMessage, IpcReader, IpcWriter};

fn now_ms() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

async fn send(out: &mut IpcWriter<tokio::io::Stdout>, message: IpcMessage) {
    let envelope = IpcEnvelope::new("fake", now_ms(), message);
    let _ = out.send(&envelope).await;
}

#[tokio::main]
async fn main() {
    let token = std::env::var("BOT_TOKEN").unwrap_or_default();
    let mut out = IpcWriter::new(tokio::io::stdout());
    send(&mut out, IpcMessage::Ready).await;

    if token == "CRASH-ME" {
        std::process::exit(7);
    }

    let start_time = Instant::now();
    let mut input = IpcReader::new(tokio::io::stdin());
    loop {
        match input.recv().await {
            Ok(Some(envelope)) => match envelope.message {
                IpcMessage::Shutdown => std::process::exit(0),
                IpcMessage::HealthCheck => {
                    let uptime_secs = start_time.elapsed().as_secs();
                    send(&mut out, IpcMessage::HealthResponse { uptime_secs, mem_bytes: 0 }).await;
                }
                _ => {}
            },
            Ok(None) | Err(_) => std::process::exit(0),
        }
    }
}
