// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The control bot's access gate (spec §4.7: "the supervisor's admin-bot
//! uses an analogous gate against `controlAdminIds`"). Kept separate from
//! the worker's gate — same check, a distinct admin id set and a distinct
//! failure policy (there is no `autoKill` concept for the control bot;
//! the supervisor process itself is never torn down over a denied admin
//! command).

use std::sync::Arc;

use fleet_common::chat::{ChatApi, ChatId, UserId};
use tracing::warn;

/// Run the control bot's access check for `user_id` against
/// `control_admin_ids` and reply over `chat` on denial.
pub async fn check(chat: &Arc<dyn ChatApi>, chat_id: ChatId, user_id: Option<UserId>, control_admin_ids: &[i64]) -> bool {
    let Some(user_id) = user_id else {
        if let Err(e) = chat.send_message(chat_id, "unable to identify").await {
            warn!(error = %e, "failed to send control-bot identify-failure reply");
        }
        return false;
    };

    if control_admin_ids.contains(&user_id.0) {
        return true;
    }

    let text = format!("unauthorised (your id: {})", user_id.0);
    if let Err(e) = chat.send_message(chat_id, &text).await {
        warn!(error = %e, "failed to send control-bot denial reply");
    }
    false
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
