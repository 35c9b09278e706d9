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

//! RFCOMM link console.
//!
//! Usage: rfcomm-link [ADDRESS]
//!
//! Reads commands from stdin:
//!   order <q1> <q2> ...   send a dispense order
//!   connect | stop | status | quit
//!   anything else is sent verbatim

use anyhow::Result;
use parking_lot::Mutex;
use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rfcomm_link::bluetooth::{OrderCommand, Telemetry};
use rfcomm_link::config::Config;
use rfcomm_link::{LinkCallback, LinkManager, PeerHandle, RfcommTransport};

/// Prints link events and watches telemetry for the pending order.
struct Console {
    pending_order: Arc<Mutex<Option<OrderCommand>>>,
}

impl LinkCallback for Console {
    fn on_message_received(&mut self, text: String) {
        match Telemetry::parse(&text) {
            Some(telemetry) => {
                let mut pending = self.pending_order.lock();
                let ready = pending
                    .as_ref()
                    .map(|order| telemetry.order_ready(order))
                    .unwrap_or(false);
                if ready {
                    println!("Order ready ({:?})", telemetry);
                    pending.take();
                } else {
                    println!("Telemetry: {:?}", telemetry);
                }
            }
            None => println!("< {}", text),
        }
    }

    fn on_connection_status_changed(&mut self, connected: bool) {
        if connected {
            println!("Connected to peripheral");
        } else {
            println!("Disconnected from peripheral");
        }
    }

    fn on_error(&mut self, reason: String) {
        println!("ERROR: {}", reason);
    }
}

/// One stdin line.
#[derive(Debug, PartialEq)]
enum Input {
    Order(Vec<u32>),
    Connect,
    Stop,
    Status,
    Quit,
    Raw(String),
    Empty,
}

impl Input {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let mut words = line.split_whitespace();

        let input = match words.next() {
            None => Self::Empty,
            Some("order") => {
                let quantities = words
                    .map(|w| w.parse::<u32>())
                    .collect::<Result<Vec<_>, _>>()
                    .ok()?;
                Self::Order(quantities)
            }
            Some("connect") => Self::Connect,
            Some("stop") => Self::Stop,
            Some("status") => Self::Status,
            Some("quit") | Some("exit") => Self::Quit,
            Some(_) => Self::Raw(line.to_string()),
        };
        Some(input)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rfcomm_link=info".parse()?),
        )
        .init();

    info!("Starting rfcomm-link v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded");

    let mut peer = config.peer.to_handle();
    if let Some(address) = env::args().nth(1) {
        peer = PeerHandle::new(peer.name(), address);
    }

    let transport = RfcommTransport::new(config.link.rfcomm_channel).await?;
    match transport.paired_device(peer.address()).await {
        Ok(Some(paired)) => peer = paired,
        Ok(None) => warn!("{} is not paired, pair it first", peer),
        Err(e) => warn!("Paired device lookup failed: {}", e),
    }

    let manager = LinkManager::new(transport, config.link.clone());
    let pending_order = Arc::new(Mutex::new(None));
    let delivery = manager.register(Console {
        pending_order: pending_order.clone(),
    });

    manager.connect(peer.clone()).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    info!("Ready. Type 'order 2 0 1' to dispense, 'quit' to exit.");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match Input::parse(&line) {
                    Some(Input::Order(quantities)) => {
                        match OrderCommand::from_quantities(&quantities) {
                            Some(order) => {
                                info!("Sending order: {}", order);
                                manager.write(order.to_bytes()).await;
                                *pending_order.lock() = Some(order);
                            }
                            None => println!("No items selected"),
                        }
                    }
                    Some(Input::Connect) => manager.connect(peer.clone()).await,
                    Some(Input::Stop) => manager.stop().await,
                    Some(Input::Status) => println!("Link: {}", manager.state().as_str()),
                    Some(Input::Quit) => break,
                    Some(Input::Raw(text)) => manager.write(text.into_bytes()).await,
                    Some(Input::Empty) => {}
                    None => println!("Usage: order <count> [<count> ...]"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    manager.stop().await;
    manager.dispatcher().detach();
    let _ = delivery.await;

    info!("rfcomm-link stopped");
    Ok(())
}
