// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access Gate (spec §4.7): the check every dispatcher handler — worker
//! or supervisor control-bot — runs before touching anything else.

use std::sync::Arc;

use fleet_common::chat::{ChatApi, ChatId, UserId};
use tracing::warn;

/// Outcome of an access-gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    /// The update carried no resolvable user id.
    NoUserId,
    /// The user id is not in the allow-list; the worker should exit
    /// shortly after this reply if `auto_kill` is set (the caller decides,
    /// since only the worker knows its own shutdown handle).
    Denied { auto_kill: bool },
}

/// Run the gate for `user_id` against `allowed` and reply over `chat` as
/// required by spec §4.7. Returns the decision so the caller can act on
/// `auto_kill` (worker exit) without this function owning the process
/// lifecycle.
pub async fn check(chat: &Arc<dyn ChatApi>, chat_id: ChatId, user_id: Option<UserId>, allowed: &[i64], auto_kill: bool) -> GateDecision {
    let Some(user_id) = user_id else {
        if let Err(e) = chat.send_message(chat_id, "unable to identify").await {
            warn!(error = %e, "failed to send access-gate identify-failure reply");
        }
        return GateDecision::NoUserId;
    };

    if allowed.contains(&user_id.0) {
        return GateDecision::Allowed;
    }

    if auto_kill {
        if let Err(e) = chat.send_message(chat_id, "unauthorised; shutting down").await {
            warn!(error = %e, "failed to send auto-kill notice");
        }
    } else {
        let text = format!("unauthorised (your id: {})", user_id.0);
        if let Err(e) = chat.send_message(chat_id, &text).await {
            warn!(error = %e, "failed to send denial reply");
        }
    }

    GateDecision::Denied { auto_kill }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
