// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn fresh_worker_snapshot_is_stopped_with_masked_token() {
    let worker = WorkerProcess::new("bot-0".to_string(), "1234567890:ABCDEF".to_string());
    let snap = worker.snapshot().await;
    assert_eq!(snap.bot_id, "bot-0");
    assert_eq!(snap.status, WorkerStatus::Stopped);
    assert!(snap.os_pid.is_none());
    assert!(snap.uptime.is_none());
    assert_eq!(snap.masked_token, "***CDEF");
}

#[tokio::test]
async fn ring_log_is_bounded_and_keeps_most_recent() {
    let worker = WorkerProcess::new("bot-0".to_string(), "token".to_string());
    for i in 0..(RING_LOG_CAPACITY + 10) {
        worker.push_log(format!("line {i}"), false).await;
    }
    let lines = worker.log_lines().await;
    assert_eq!(lines.len(), RING_LOG_CAPACITY);
    assert_eq!(lines.first().map(String::as_str), Some("line 10"));
    assert_eq!(lines.last().map(String::as_str), Some(format!("line {}", RING_LOG_CAPACITY + 9).as_str()));
}

#[tokio::test]
async fn health_check_without_a_running_child_fails_fast() {
    let worker = WorkerProcess::new("bot-0".to_string(), "token".to_string());
    assert!(!worker.health_check().await);
}

#[tokio::test]
async fn wait_ready_returns_immediately_once_already_running() {
    let worker = WorkerProcess::new("bot-0".to_string(), "token".to_string());
    worker.state.write().await.status = WorkerStatus::Running;
    assert!(worker.wait_ready(Duration::from_millis(10)).await);
}

#[tokio::test]
async fn handle_ready_envelope_marks_running() {
    let worker = WorkerProcess::new("bot-0".to_string(), "token".to_string());
    let envelope = IpcEnvelope::new("bot-0", 0, IpcMessage::Ready);
    worker.handle_envelope(envelope).await;
    assert_eq!(worker.snapshot().await.status, WorkerStatus::Running);
}

#[tokio::test]
async fn error_envelope_records_last_error() {
    let worker = WorkerProcess::new("bot-0".to_string(), "token".to_string());
    let envelope = IpcEnvelope::new("bot-0", 0, IpcMessage::Error { text: "boom".to_string() });
    worker.handle_envelope(envelope).await;
    assert_eq!(worker.snapshot().await.last_error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn auto_kill_status_update_marks_the_exit_self_initiated() {
    let worker = WorkerProcess::new("bot-0".to_string(), "token".to_string());
    let envelope = IpcEnvelope::new("bot-0", 0, IpcMessage::StatusUpdate { status: "auto_kill".to_string() });
    worker.handle_envelope(envelope).await;
    assert!(worker.state.read().await.self_initiated_stop);
}

#[tokio::test]
async fn unrelated_status_update_does_not_mark_the_exit_self_initiated() {
    let worker = WorkerProcess::new("bot-0".to_string(), "token".to_string());
    let envelope = IpcEnvelope::new("bot-0", 0, IpcMessage::StatusUpdate { status: "session opened".to_string() });
    worker.handle_envelope(envelope).await;
    assert!(!worker.state.read().await.self_initiated_stop);
}
