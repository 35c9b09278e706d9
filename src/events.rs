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

//! Event delivery from the link workers to the consumer.
//!
//! Every producer (state machine, connector, session) emits into one
//! unbounded channel. The single receiver is the only delivery context, so
//! consumer handlers never run concurrently with each other.

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Events emitted by the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Trimmed, non-empty text received from the peer.
    MessageReceived(String),
    /// Emitted once per state transition; `true` iff the new state is connected.
    ConnectivityChanged(bool),
    /// Human-readable failure reason.
    Error(String),
}

impl LinkEvent {
    /// Hand this event to the matching callback method.
    pub fn dispatch<C: LinkCallback + ?Sized>(self, callback: &mut C) {
        match self {
            LinkEvent::MessageReceived(text) => callback.on_message_received(text),
            LinkEvent::ConnectivityChanged(connected) => {
                callback.on_connection_status_changed(connected)
            }
            LinkEvent::Error(reason) => callback.on_error(reason),
        }
    }
}

/// Callback-style consumer contract.
pub trait LinkCallback: Send + 'static {
    fn on_message_received(&mut self, text: String);
    fn on_connection_status_changed(&mut self, connected: bool);
    fn on_error(&mut self, reason: String);
}

/// Serialized, fire-and-forget delivery to at most one consumer.
#[derive(Debug, Default)]
pub struct EventDispatcher {
    consumer: Mutex<Option<mpsc::UnboundedSender<LinkEvent>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new consumer, replacing any previous one.
    ///
    /// The previous receiver sees its channel close once drained.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<LinkEvent> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        *self.consumer.lock() = Some(event_tx);
        event_rx
    }

    /// Attach `callback` as the consumer and drive it from one task.
    pub fn register<C: LinkCallback>(&self, callback: C) -> JoinHandle<()> {
        let event_rx = self.subscribe();
        tokio::spawn(deliver(event_rx, callback))
    }

    /// Detach the current consumer. Later events are dropped.
    pub fn detach(&self) {
        self.consumer.lock().take();
    }

    #[cfg(test)]
    pub(crate) fn has_consumer(&self) -> bool {
        self.consumer
            .lock()
            .as_ref()
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    /// Emit an event. Dropped silently when nobody is listening.
    pub fn emit(&self, event: LinkEvent) {
        let consumer = self.consumer.lock();
        match consumer.as_ref() {
            Some(event_tx) => {
                if let Err(e) = event_tx.send(event) {
                    debug!("Consumer gone, dropping event: {:?}", e.0);
                }
            }
            None => debug!("No consumer registered, dropping event: {:?}", event),
        }
    }
}

/// Deliver events to `callback` one at a time until the channel closes.
pub async fn deliver<C: LinkCallback>(
    mut event_rx: mpsc::UnboundedReceiver<LinkEvent>,
    mut callback: C,
) {
    while let Some(event) = event_rx.recv().await {
        event.dispatch(&mut callback);
    }
    debug!("Event delivery loop exited");
}
