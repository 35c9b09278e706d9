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

//! Single-peer Bluetooth RFCOMM link manager.
//!
//! Establishes, maintains and tears down one serial-style link to a remote
//! peripheral and exchanges text commands and telemetry with it. Inbound
//! events reach the consumer through [`events::EventDispatcher`].

pub mod bluetooth;
pub mod config;
pub mod error;
pub mod events;
pub mod state;

pub use bluetooth::{LinkManager, PeerHandle, RfcommTransport, Transport};
pub use error::LinkError;
pub use events::{LinkCallback, LinkEvent};
pub use state::ConnectionState;
