// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chunk-counted output ring buffer for a PTY session (spec §3 invariant
//! I2: `|output| <= maxOutputLines`, counted in *chunks*, not bytes).

use std::collections::VecDeque;

use bytes::Bytes;

/// Bounded ordered sequence of the most recent PTY output chunks.
#[derive(Debug, Clone)]
pub struct ChunkRing {
    chunks: VecDeque<Bytes>,
    capacity: usize,
}

impl ChunkRing {
    /// Create a ring holding at most `capacity` chunks.
    pub fn new(capacity: usize) -> Self {
        Self { chunks: VecDeque::with_capacity(capacity.min(1024)), capacity: capacity.max(1) }
    }

    /// Append a chunk, evicting the oldest one if at capacity.
    pub fn push(&mut self, chunk: Bytes) {
        if self.chunks.len() >= self.capacity {
            self.chunks.pop_front();
        }
        self.chunks.push_back(chunk);
    }

    /// Number of chunks currently held.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// An atomic copy of the ring's current chunks, in order.
    pub fn snapshot(&self) -> Vec<Bytes> {
        self.chunks.iter().cloned().collect()
    }

    /// All chunks concatenated into one buffer — the view fed to the
    /// renderer and to URL/bell detection.
    pub fn concatenated(&self) -> Vec<u8> {
        let total: usize = self.chunks.iter().map(|c| c.len()).sum();
        let mut out = Vec::with_capacity(total);
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        out
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;
