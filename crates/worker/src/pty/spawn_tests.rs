// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::sync::mpsc;

#[tokio::test]
async fn spawn_reports_child_pid() {
    let pty = NativePty::spawn("/bin/sh", 80, 24, &std::env::temp_dir()).expect("spawn failed");
    assert!(pty.child_pid().is_some());
}

#[tokio::test]
async fn write_then_read_echoes_command_output() {
    let (output_tx, mut output_rx) = mpsc::channel(64);
    let (input_tx, input_rx) = mpsc::channel::<Bytes>(64);
    let (_resize_tx, resize_rx) = mpsc::channel::<(u16, u16)>(4);

    let mut pty = NativePty::spawn("/bin/sh", 80, 24, &std::env::temp_dir()).expect("spawn failed");
    let handle = tokio::spawn(async move { pty.run(output_tx, input_rx, resize_rx).await });

    input_tx.send(Bytes::from_static(b"echo hello-from-pty\n")).await.expect("send");
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    input_tx.send(Bytes::from_static(b"exit\n")).await.expect("send exit");
    drop(input_tx);

    let status = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("timed out")
        .expect("join")
        .expect("run");
    assert_eq!(status.code, Some(0));

    let mut output = Vec::new();
    while let Ok(chunk) = output_rx.try_recv() {
        output.extend_from_slice(&chunk);
    }
    let text = String::from_utf8_lossy(&output);
    assert!(text.contains("hello-from-pty"), "expected echoed text in {text:?}");
}

#[tokio::test]
async fn resize_updates_window_size_without_error() {
    let pty = NativePty::spawn("/bin/sh", 80, 24, &std::env::temp_dir()).expect("spawn failed");
    pty.resize(100, 40).expect("resize failed");
}
