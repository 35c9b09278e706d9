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

//! Link state management.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::bluetooth::PeerHandle;

/// Lifecycle state of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connector or session is running.
    #[default]
    None,
    /// A connector is opening a stream to the peer.
    Connecting,
    /// A session owns a live stream.
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::None => "None",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Snapshot of the link readable without entering the state machine.
///
/// Written only by the link manager while it holds its transition lock.
#[derive(Debug, Default)]
pub struct LinkStatus {
    state: RwLock<ConnectionState>,
    peer: RwLock<Option<PeerHandle>>,
}

impl LinkStatus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
        if state == ConnectionState::None {
            *self.peer.write() = None;
        }
    }

    pub(crate) fn set_peer(&self, peer: PeerHandle) {
        *self.peer.write() = Some(peer);
    }

    pub fn get_state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn get_peer(&self) -> Option<PeerHandle> {
        self.peer.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.get_state().is_connected()
    }
}
