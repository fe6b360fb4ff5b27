// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal Renderer client (spec §4.2): a thin, stateless HTTP wrapper
//! around the headless-browser rendering sidecar — an external
//! collaborator, not implemented in this workspace. Mirrors the shape of
//! an `UpstreamClient` talking to a sibling process.

use anyhow::bail;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
struct RenderRequest<'a> {
    buffer: &'a [u8],
    rows: u16,
    cols: u16,
    font_size: u16,
}

/// HTTP client for the headless-browser rendering sidecar.
///
/// Stateless at the interface and cheap to construct — recovering from a
/// renderer crash is just "re-init next call" since there is no
/// persistent connection or pooled page reference held here; every
/// `render()` call is an independent request.
pub struct RendererClient {
    base_url: String,
    client: Client,
}

impl RendererClient {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self { base_url, client }
    }

    /// Render the raw, ANSI-laden concatenated output chunks to a PNG.
    /// The renderer itself owns the terminal emulation that turns bytes
    /// into pixels — no ANSI stripping happens on this side (spec §4.2).
    ///
    /// Failure is always returned as `Err`, mapped by the caller to
    /// [`fleet_common::error::ErrorCode::RenderFailed`] — this client
    /// never panics (spec §4.2: "must not crash the worker").
    pub async fn render(&self, buffer: &[u8], rows: u16, cols: u16, font_size: u16) -> anyhow::Result<Vec<u8>> {
        let body = RenderRequest { buffer, rows, cols, font_size };
        let resp = self.client.post(format!("{}/render", self.base_url)).json(&body).send().await?;
        if !resp.status().is_success() {
            bail!("renderer returned status {}", resp.status());
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
