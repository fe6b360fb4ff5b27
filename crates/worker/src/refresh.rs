// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auto-Refresh Controller (spec §4.4): a per-session, cancel-and-replace
//! ticker that re-renders the screen and edits the last screenshot
//! message in place, skipping ticks whose buffer hash hasn't changed.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use fleet_common::chat::ChatApi;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::renderer::RendererClient;
use crate::session::PtySession;

pub(crate) fn hash_bytes(data: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    hasher.finish()
}

/// Drives the repeated render-and-edit ticks for one [`PtySession`].
///
/// Every `request_refresh` call cancels any ticker already running for
/// this controller before starting a new one, so refresh requests never
/// stack (spec §4.4: "if a refresh is already running... cancel it").
pub struct AutoRefreshController {
    current: Mutex<Option<CancellationToken>>,
}

impl AutoRefreshController {
    pub fn new() -> Self {
        Self { current: Mutex::new(None) }
    }

    /// Start (or restart) the refresh ticker for `session`.
    pub async fn request_refresh(
        &self,
        session: Arc<PtySession>,
        chat: Arc<dyn ChatApi>,
        renderer: Arc<RendererClient>,
        interval: Duration,
        max_ticks: u32,
        font_size: u16,
    ) {
        let token = session.scope.child_token();
        {
            let mut current = self.current.lock().await;
            if let Some(prev) = current.take() {
                prev.cancel();
            }
            *current = Some(token.clone());
        }

        tokio::spawn(async move {
            // "First tick fires after one interval" (spec §4.4) — unlike
            // the default `interval()`, whose first tick completes
            // immediately.
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            for _ in 0..max_ticks {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                tick_once(&session, &chat, &renderer, font_size).await;
            }
        });
    }

    /// Cancel any running ticker without starting a new one (spec §4.1:
    /// "after close(userId), no auto-refresh tick... fires").
    pub async fn cancel(&self) {
        if let Some(prev) = self.current.lock().await.take() {
            prev.cancel();
        }
    }
}

impl Default for AutoRefreshController {
    fn default() -> Self {
        Self::new()
    }
}

async fn tick_once(session: &Arc<PtySession>, chat: &Arc<dyn ChatApi>, renderer: &Arc<RendererClient>, font_size: u16) {
    let (buffer, cols, rows) = session.snapshot().await;
    let hash = hash_bytes(&buffer);
    if hash == session.last_screenshot_buffer_hash.load(Ordering::SeqCst) {
        return;
    }

    let msg_id = *session.last_screenshot_msg_id.lock().await;
    let Some(msg_id) = msg_id else {
        return;
    };

    let png = match renderer.render(&buffer, rows, cols, font_size).await {
        Ok(png) => png,
        Err(e) => {
            warn!(user_id = session.user_id.0, error = %e, "render failed during auto-refresh");
            return;
        }
    };

    let tmp = match tempfile::Builder::new().suffix(".png").tempfile() {
        Ok(tmp) => tmp,
        Err(e) => {
            warn!(user_id = session.user_id.0, error = %e, "failed to create temp file for screenshot");
            return;
        }
    };
    if std::fs::write(tmp.path(), &png).is_err() {
        return;
    }

    match chat.edit_message_media(session.chat_id, msg_id, tmp.path()).await {
        Ok(()) => session.last_screenshot_buffer_hash.store(hash, Ordering::SeqCst),
        Err(e) => debug!(user_id = session.user_id.0, error = %e, "editMessageMedia failed during auto-refresh"),
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
