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

//! Bluetooth communication module.
//!
//! Manages the RFCOMM link to the peripheral: connect, read, write, stop.

mod connection;
mod connector;
mod framing;
mod manager;
pub mod protocol;
mod transport;

pub use framing::{Framing, MessageFramer, MAX_PENDING_LINE};
pub use manager::LinkManager;
pub use protocol::{OrderCommand, Telemetry};
pub use transport::{
    LinkStream, PeerHandle, RfcommTransport, Transport, DEFAULT_RFCOMM_CHANNEL, SPP_UUID,
};
