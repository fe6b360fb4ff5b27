// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::AtomicUsize;
use tokio_util::sync::CancellationToken;

fn user(n: i64) -> UserId {
    UserId(n)
}

fn chat(n: i64) -> ChatId {
    ChatId(n)
}

fn manager() -> Arc<SessionManager> {
    SessionManager::new(
        "/bin/sh".into(),
        24,
        80,
        Duration::from_secs(3600),
        64,
        std::env::temp_dir(),
        CancellationToken::new(),
    )
}

#[tokio::test]
async fn create_then_get_round_trips() {
    let mgr = manager();
    let session = mgr.create_session(user(1), chat(1), SessionCallbacks::default()).await.expect("create");
    assert!(session.child_pid().is_some());
    assert!(mgr.exists(user(1)).await);
    assert_eq!(mgr.session_count().await, 1);
}

#[tokio::test]
async fn create_twice_for_same_user_fails() {
    let mgr = manager();
    mgr.create_session(user(1), chat(1), SessionCallbacks::default()).await.expect("first create");
    let err = mgr.create_session(user(1), chat(1), SessionCallbacks::default()).await.unwrap_err();
    assert_eq!(err, SessionError::AlreadyExists);
}

#[tokio::test]
async fn write_then_snapshot_contains_echoed_output() {
    let mgr = manager();
    let session = mgr.create_session(user(1), chat(1), SessionCallbacks::default()).await.expect("create");

    session.write("echo session-write-probe", true).await.expect("write");
    tokio::time::sleep(Duration::from_millis(300)).await;

    let (bytes, cols, rows) = session.snapshot().await;
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("session-write-probe"), "expected probe text in {text:?}");
    assert_eq!((cols, rows), (80, 24));
}

#[tokio::test]
async fn on_data_callback_fires_for_output_chunks() {
    let mgr = manager();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_cb = Arc::clone(&seen);
    let callbacks = SessionCallbacks {
        on_data: Some(Arc::new(move |_chunk: &[u8]| {
            seen_cb.fetch_add(1, Ordering::SeqCst);
        })),
        on_buffering_ended: None,
    };

    let session = mgr.create_session(user(1), chat(1), callbacks).await.expect("create");
    session.write("echo callback-probe", true).await.expect("write");
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(seen.load(Ordering::SeqCst) > 0, "expected on_data to fire at least once");
}

#[tokio::test]
async fn close_removes_session_and_allows_recreate() {
    let mgr = manager();
    mgr.create_session(user(1), chat(1), SessionCallbacks::default()).await.expect("create");
    mgr.close(user(1)).await.expect("close");

    // Give the exit-watcher task a moment; close() itself already removed
    // the map entry synchronously, so this should be immediate.
    assert!(!mgr.exists(user(1)).await);

    mgr.create_session(user(1), chat(1), SessionCallbacks::default()).await.expect("recreate after close");
}

#[tokio::test]
async fn close_unknown_user_reports_not_found() {
    let mgr = manager();
    let err = mgr.close(user(42)).await.unwrap_err();
    assert_eq!(err, SessionError::NotFound);
}

#[tokio::test]
async fn resize_does_not_error_on_live_session() {
    let mgr = manager();
    let session = mgr.create_session(user(1), chat(1), SessionCallbacks::default()).await.expect("create");
    session.resize(100, 40).await.expect("resize");
}
