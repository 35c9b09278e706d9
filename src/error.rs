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

//! Link failure kinds.
//!
//! None of these escape the public API as `Err` values; their `Display`
//! text is the reason carried by [`crate::LinkEvent::Error`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    /// A write was requested while no session was connected.
    #[error("Bluetooth not connected")]
    NotConnected,

    /// The connector could not open a stream to the peer.
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// The session stream reached end-of-stream or failed to read.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("write failed: {0}")]
    WriteFailed(String),
}
