// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{FakeChatApi, FakeChatCall};

fn watcher(chat: Arc<FakeChatApi>, allowed: Vec<i64>, dir: PathBuf) -> Arc<MediaWatcher> {
    MediaWatcher::new(chat as Arc<dyn ChatApi>, allowed, dir)
}

#[tokio::test]
async fn prepare_directory_creates_media_and_sent_dirs() {
    let root = tempfile::tempdir().expect("tempdir");
    let media_dir = root.path().join("bot-0");
    let w = watcher(Arc::new(FakeChatApi::new()), vec![1], media_dir.clone());

    w.prepare_directory(false).await.expect("prepare");

    assert!(media_dir.is_dir());
    assert!(media_dir.join("sent").is_dir());
}

#[tokio::test]
async fn prepare_directory_with_clean_on_start_wipes_existing_contents() {
    let root = tempfile::tempdir().expect("tempdir");
    let media_dir = root.path().join("bot-0");
    tokio::fs::create_dir_all(&media_dir).await.expect("mkdir");
    tokio::fs::write(media_dir.join("stale.png"), b"old").await.expect("write");

    let w = watcher(Arc::new(FakeChatApi::new()), vec![1], media_dir.clone());
    w.prepare_directory(true).await.expect("prepare");

    assert!(!media_dir.join("stale.png").exists());
    assert!(media_dir.join("sent").is_dir());
}

#[tokio::test]
async fn handle_candidate_ignores_sent_and_received_markers() {
    let root = tempfile::tempdir().expect("tempdir");
    let media_dir = root.path().to_path_buf();
    let chat = Arc::new(FakeChatApi::new());
    let w = watcher(chat.clone(), vec![1], media_dir.clone());

    Arc::clone(&w).handle_candidate(media_dir.join("sent")).await;
    Arc::clone(&w).handle_candidate(media_dir.join("received")).await;

    assert!(chat.calls().is_empty());
}

#[tokio::test]
async fn handle_candidate_sends_to_every_allowed_user_then_moves_file() {
    let root = tempfile::tempdir().expect("tempdir");
    let media_dir = root.path().to_path_buf();
    tokio::fs::create_dir_all(media_dir.join("sent")).await.expect("mkdir");
    let path = media_dir.join("screenshot.png");
    tokio::fs::write(&path, b"fake png bytes").await.expect("write");

    let chat = Arc::new(FakeChatApi::new());
    let w = watcher(chat.clone(), vec![10, 20], media_dir.clone());

    Arc::clone(&w).handle_candidate(path.clone()).await;

    let calls = chat.calls();
    let photo_sends: Vec<_> = calls.iter().filter(|c| matches!(c, FakeChatCall::SendPhoto(..))).collect();
    assert_eq!(photo_sends.len(), 2, "expected one send per allowed user, got {calls:?}");
    assert!(!path.exists(), "original file should have been moved");
    assert!(media_dir.join("sent").join("screenshot.png").exists());
}

#[tokio::test]
async fn handle_candidate_is_a_no_op_for_a_path_already_in_flight() {
    let root = tempfile::tempdir().expect("tempdir");
    let media_dir = root.path().to_path_buf();
    let path = media_dir.join("dup.png");
    tokio::fs::write(&path, b"bytes").await.expect("write");

    let chat = Arc::new(FakeChatApi::new());
    let w = watcher(chat.clone(), vec![1], media_dir.clone());
    w.in_flight.lock().await.insert(path.clone());

    Arc::clone(&w).handle_candidate(path.clone()).await;

    assert!(chat.calls().is_empty(), "an already in-flight path must not be re-processed");
    assert!(path.exists(), "file must be left untouched, not moved");
}

#[tokio::test]
async fn move_to_sent_appends_timestamp_suffix_on_name_collision() {
    let root = tempfile::tempdir().expect("tempdir");
    let media_dir = root.path().to_path_buf();
    tokio::fs::create_dir_all(media_dir.join("sent")).await.expect("mkdir");
    tokio::fs::write(media_dir.join("sent").join("clip.mp4"), b"existing").await.expect("write");

    let path = media_dir.join("clip.mp4");
    tokio::fs::write(&path, b"new bytes").await.expect("write");

    let chat = Arc::new(FakeChatApi::new());
    let w = watcher(chat, vec![1], media_dir.clone());
    w.move_to_sent(&path, "clip.mp4").await;

    assert!(!path.exists());
    let mut entries: Vec<_> = std::fs::read_dir(media_dir.join("sent")).expect("read_dir").filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());
    assert_eq!(entries.len(), 2, "both the original and the renamed file should be present");
    assert!(entries.iter().any(|e| e.file_name() == "clip.mp4"));
    assert!(entries.iter().any(|e| e.file_name() != "clip.mp4"));
}
