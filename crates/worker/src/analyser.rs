// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output Stream Analyser (spec §4.3): bell detection, a debounced
//! confirmation-prompt trigger, and URL discovery, run over every chunk
//! the PTY emits.

use std::time::{Duration, Instant};

use fleet_common::screen::strip_ansi;
use fleet_common::urls::extract_urls;

use crate::session::PtySession;

/// The confirmation-prompt trigger literal (spec §4.3).
const CONFIRMATION_TRIGGER: &str = "1. Y";
/// Repeats within this window collapse into a single `ConfirmationPrompt` event.
const CONFIRMATION_DEBOUNCE: Duration = Duration::from_secs(5);
/// Rolling detector-buffer size (spec §4.3: "last ≈500 chars").
const DETECTOR_BUFFER_CAP: usize = 500;

/// Something the analyser noticed in a chunk of PTY output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyserEvent {
    Bell,
    ConfirmationPrompt,
    UrlDiscovered(String),
}

/// Feed one chunk of PTY output through the analyser for `session`,
/// returning the events it fired. Mutates `session`'s detector buffer,
/// confirmation-debounce clock, and URL sets.
///
/// URLs are matched against the chunk with ANSI sequences stripped first
/// — a deliberate deviation from taking the raw chunk verbatim, called
/// out in spec §9 as a documented behavioural change (escape sequences
/// can otherwise fracture a URL across regex matches).
pub async fn analyse_chunk(session: &PtySession, chunk: &[u8]) -> Vec<AnalyserEvent> {
    let mut events = Vec::new();

    if chunk.contains(&0x07) {
        events.push(AnalyserEvent::Bell);
    }

    {
        let mut buffer = session.detector_buffer.lock().await;
        for &byte in chunk {
            if buffer.len() >= DETECTOR_BUFFER_CAP {
                buffer.pop_front();
            }
            buffer.push_back(byte);
        }
        let text: String = buffer.iter().map(|&b| b as char).collect();
        if text.contains(CONFIRMATION_TRIGGER) {
            let mut last_fired = session.last_confirmation_fired.lock().await;
            let should_fire = match *last_fired {
                Some(at) => at.elapsed() >= CONFIRMATION_DEBOUNCE,
                None => true,
            };
            if should_fire {
                events.push(AnalyserEvent::ConfirmationPrompt);
                *last_fired = Some(Instant::now());
            }
        }
    }

    let stripped = strip_ansi(chunk);
    for url in extract_urls(&stripped) {
        let mut notified = session.notified_urls.lock().await;
        if notified.insert(url.clone()) {
            session.discovered_urls.lock().await.insert(url.clone());
            events.push(AnalyserEvent::UrlDiscovered(url));
        }
    }

    events
}

#[cfg(test)]
#[path = "analyser_tests.rs"]
mod tests;
