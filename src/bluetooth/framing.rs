// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cutting inbound byte chunks into text messages.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Largest partial line kept while waiting for a newline.
pub const MAX_PENDING_LINE: usize = 4096;

/// Message boundary rule for inbound bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Whatever one read call returns is one message.
    #[default]
    PerRead,
    /// Buffer across reads and split on `\n`.
    Lines,
}

/// Turns raw chunks into trimmed, non-empty messages.
pub struct MessageFramer {
    framing: Framing,
    buffer: Vec<u8>,
}

impl MessageFramer {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            buffer: Vec::with_capacity(MAX_PENDING_LINE),
        }
    }

    /// Process one chunk returned by a read call.
    ///
    /// Returns the messages completed by this chunk, possibly none.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        match self.framing {
            Framing::PerRead => decode(chunk).into_iter().collect(),
            Framing::Lines => self.push_lines(chunk),
        }
    }

    fn push_lines(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut messages = Vec::new();

        for &byte in chunk {
            if byte == b'\n' {
                messages.extend(decode(&self.buffer));
                self.buffer.clear();
                continue;
            }

            self.buffer.push(byte);
            if self.buffer.len() > MAX_PENDING_LINE {
                warn!(
                    "No newline within {} bytes, flushing partial line",
                    MAX_PENDING_LINE
                );
                let cut = complete_prefix_len(&self.buffer);
                messages.extend(decode(&self.buffer[..cut]));
                self.buffer = self.buffer.split_off(cut);
            }
        }

        if !self.buffer.is_empty() {
            debug!("Holding {} bytes of a partial line", self.buffer.len());
        }

        messages
    }

    /// Check if a partial line is buffered.
    pub fn is_in_progress(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Get current buffer size.
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }
}

/// Length of `bytes` without a trailing incomplete UTF-8 sequence.
fn complete_prefix_len(bytes: &[u8]) -> usize {
    let len = bytes.len();
    let lead = (len.saturating_sub(4)..len)
        .rev()
        .find(|&i| bytes[i] & 0xC0 != 0x80);
    let Some(start) = lead else {
        return len;
    };

    let width = match bytes[start] {
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        b if b >= 0xC0 => 2,
        _ => 1,
    };
    if start > 0 && start + width > len {
        start
    } else {
        len
    }
}

/// Lossy UTF-8 decode and trim; `None` if nothing but whitespace remains.
fn decode(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
