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

//! Stream transports and the Bluetooth RFCOMM client.

use anyhow::{anyhow, Result};
use bluer::rfcomm::{SocketAddr, Stream};
use bluer::{Adapter, Address};
use futures::future::BoxFuture;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};
use uuid::Uuid;

/// Standard SPP UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// RFCOMM channel serial port peripherals listen on unless configured otherwise.
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

/// Identifies the remote endpoint of a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerHandle {
    name: String,
    address: String,
}

impl PeerHandle {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// A live duplex byte stream. Dropping it closes it.
pub trait LinkStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<S> LinkStream for S where S: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Opens streams to peers.
///
/// The returned future may block for as long as the handshake takes; the
/// connector drops it on cancellation, which must release any partially
/// opened socket.
pub trait Transport: Send + Sync + 'static {
    type Stream: LinkStream;

    fn open<'a>(&'a self, peer: &'a PeerHandle) -> BoxFuture<'a, Result<Self::Stream>>;
}

/// RFCOMM client transport backed by BlueZ.
pub struct RfcommTransport {
    adapter: Adapter,
    channel: u8,
}

impl RfcommTransport {
    /// Open a BlueZ session and prepare the default adapter.
    pub async fn new(channel: u8) -> Result<Self> {
        info!("Initializing Bluetooth transport...");

        // Create BlueZ session
        let session = bluer::Session::new().await?;
        info!("BlueZ session created");

        // Get the default adapter
        let adapter = session.default_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        // Ensure adapter is powered on
        if !adapter.is_powered().await? {
            info!("Powering on Bluetooth adapter...");
            adapter.set_powered(true).await?;
        }

        info!(
            "Serial port service {} on RFCOMM channel {}",
            SPP_UUID, channel
        );

        Ok(Self { adapter, channel })
    }

    /// Look up a bonded device and use its alias as the peer name.
    ///
    /// Returns `None` when the device is unknown to the adapter or not paired.
    pub async fn paired_device(&self, address: &str) -> Result<Option<PeerHandle>> {
        let address = parse_address(address)?;

        for addr in self.adapter.device_addresses().await? {
            if addr != address {
                continue;
            }
            let device = self.adapter.device(addr)?;
            if device.is_paired().await? {
                let name = device.alias().await.unwrap_or_else(|_| addr.to_string());
                return Ok(Some(PeerHandle::new(name, addr.to_string())));
            }
        }

        Ok(None)
    }
}

impl Transport for RfcommTransport {
    type Stream = Stream;

    fn open<'a>(&'a self, peer: &'a PeerHandle) -> BoxFuture<'a, Result<Stream>> {
        Box::pin(async move {
            let address = parse_address(peer.address())?;
            let target = SocketAddr::new(address, self.channel);
            debug!("Opening RFCOMM stream to {:?}", target);

            let stream = Stream::connect(target).await?;
            info!("RFCOMM stream open to {}", peer);
            Ok(stream)
        })
    }
}

fn parse_address(address: &str) -> Result<Address> {
    address
        .trim()
        .parse::<Address>()
        .map_err(|e| anyhow!("Invalid Bluetooth address '{}': {}", address, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spp_uuid_format() {
        assert_eq!(
            SPP_UUID.to_string().to_uppercase(),
            "00001101-0000-1000-8000-00805F9B34FB"
        );
    }

    #[test]
    fn test_parse_address() {
        let address = parse_address(" 34:5F:45:AA:B2:0A ").unwrap();
        assert_eq!(address.to_string(), "34:5F:45:AA:B2:0A");
        assert!(parse_address("not-an-address").is_err());
    }

    #[test]
    fn test_peer_display() {
        let peer = PeerHandle::new("ESP32", "34:5F:45:AA:B2:0A");
        assert_eq!(peer.to_string(), "ESP32 (34:5F:45:AA:B2:0A)");
    }
}
