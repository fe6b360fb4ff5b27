// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Media Watcher (spec §4.6): watches `{mediaRoot}/{botId}/` and fans out
//! any new file to every allowed user, then moves it into `sent/`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use fleet_common::chat::{ChatApi, ChatId, MediaKind};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Grace period between a create/rename event and reading the file, so a
/// writer still appending to it doesn't get read mid-write (spec §4.6).
const WRITE_GRACE: Duration = Duration::from_millis(100);

pub struct MediaWatcher {
    chat: Arc<dyn ChatApi>,
    allowed_user_ids: Vec<i64>,
    media_dir: PathBuf,
    /// Paths currently being processed, so a second create/rename event
    /// for the same path doesn't re-enter while the first is in flight.
    in_flight: Mutex<HashSet<PathBuf>>,
}

impl MediaWatcher {
    pub fn new(chat: Arc<dyn ChatApi>, allowed_user_ids: Vec<i64>, media_dir: PathBuf) -> Arc<Self> {
        Arc::new(Self { chat, allowed_user_ids, media_dir, in_flight: Mutex::new(HashSet::new()) })
    }

    /// Recreate `media_dir` (and its `sent/` subdirectory), wiping any
    /// prior contents first if `clean_on_start` is set (spec §4.6).
    pub async fn prepare_directory(&self, clean_on_start: bool) -> anyhow::Result<()> {
        if clean_on_start && tokio::fs::try_exists(&self.media_dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&self.media_dir).await?;
        }
        tokio::fs::create_dir_all(&self.media_dir).await?;
        tokio::fs::create_dir_all(self.media_dir.join("sent")).await?;
        Ok(())
    }

    /// Watch `media_dir` non-recursively until `shutdown` cancels.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let (event_tx, mut event_rx) = mpsc::channel::<PathBuf>(64);
        let _watcher = self.setup_watcher(event_tx);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                event = event_rx.recv() => {
                    let Some(path) = event else { return };
                    let watcher = Arc::clone(&self);
                    tokio::spawn(async move { watcher.handle_candidate(path).await });
                }
            }
        }
    }

    fn setup_watcher(&self, event_tx: mpsc::Sender<PathBuf>) -> Option<notify::RecommendedWatcher> {
        use notify::{EventKind, RecursiveMode, Watcher};

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let Ok(event) = res else { return };
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(notify::event::ModifyKind::Name(_))) {
                return;
            }
            for path in event.paths {
                let _ = event_tx.try_send(path);
            }
        })
        .ok()?;

        watcher.watch(&self.media_dir, RecursiveMode::NonRecursive).ok()?;
        Some(watcher)
    }

    async fn handle_candidate(self: Arc<Self>, path: PathBuf) {
        let Some(filename) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else { return };
        if filename == "sent" || filename == "received" {
            return;
        }

        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(path.clone()) {
                return;
            }
        }

        tokio::time::sleep(WRITE_GRACE).await;

        let is_regular_file = matches!(tokio::fs::metadata(&path).await, Ok(meta) if meta.is_file());
        if is_regular_file {
            self.fan_out(&path, &filename).await;
        }

        self.in_flight.lock().await.remove(&path);
    }

    async fn fan_out(&self, path: &Path, filename: &str) {
        let kind = MediaKind::classify(filename);
        let mut sent_to_any = false;

        for &user_id in &self.allowed_user_ids {
            let chat_id = ChatId(user_id);
            let result = match kind {
                MediaKind::Photo => self.chat.send_photo(chat_id, path, filename).await,
                MediaKind::Animation => self.chat.send_animation(chat_id, path, filename).await,
                MediaKind::Video => self.chat.send_video(chat_id, path, filename).await,
                MediaKind::Voice => self.chat.send_voice(chat_id, path, filename).await,
                MediaKind::Audio => self.chat.send_audio(chat_id, path, filename).await,
                MediaKind::WebpDocument | MediaKind::Document => self.chat.send_document(chat_id, path, filename).await,
            };
            match result {
                Ok(_) => sent_to_any = true,
                Err(e) => warn!(path = %path.display(), user_id, error = %e, "failed to send media to user"),
            }
        }

        if sent_to_any {
            self.move_to_sent(path, filename).await;
        }
    }

    async fn move_to_sent(&self, path: &Path, filename: &str) {
        let sent_dir = self.media_dir.join("sent");
        let mut dest = sent_dir.join(filename);

        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            let stem = Path::new(filename).file_stem().and_then(|s| s.to_str()).unwrap_or(filename);
            let ext = Path::new(filename).extension().and_then(|s| s.to_str());
            let unix_ms = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
            let suffixed = match ext {
                Some(ext) => format!("{stem}_{unix_ms}.{ext}"),
                None => format!("{stem}_{unix_ms}"),
            };
            dest = sent_dir.join(suffixed);
        }

        if let Err(e) = tokio::fs::rename(path, &dest).await {
            warn!(path = %path.display(), dest = %dest.display(), error = %e, "failed to move sent media file");
        }
    }
}

#[cfg(test)]
#[path = "media_tests.rs"]
mod tests;
