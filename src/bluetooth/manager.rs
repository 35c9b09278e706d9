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

//! Link lifecycle state machine.
//!
//! All transitions run while holding one async mutex around [`LinkCore`],
//! which owns the state and the handles of the (at most one) connector and
//! (at most one) session. Replacing a worker cancels it and waits for its
//! task to end before the new one is spawned.
//!
//! Workers that report back (connect finished, connection lost) race the
//! mutex against their own cancellation token. A caller that holds the mutex
//! while shutting a worker down therefore never waits on a worker that is
//! itself waiting for the mutex.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::{spawn_session, OutboundCommand, SessionHandle};
use super::connector::{spawn_connector, ConnectorHandle};
use super::transport::{PeerHandle, Transport};
use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::events::{EventDispatcher, LinkCallback, LinkEvent};
use crate::state::{ConnectionState, LinkStatus};

/// Manager for one logical link to one peer.
///
/// Cloning yields another handle to the same link.
pub struct LinkManager<T: Transport> {
    shared: Arc<LinkShared<T>>,
}

impl<T: Transport> Clone for LinkManager<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

/// State shared between the manager handles and its workers.
pub(crate) struct LinkShared<T: Transport> {
    transport: Arc<T>,
    core: Mutex<LinkCore>,
    status: Arc<LinkStatus>,
    dispatcher: Arc<EventDispatcher>,
    config: LinkConfig,
}

#[derive(Default)]
struct LinkCore {
    state: ConnectionState,
    next_worker_id: u64,
    connector: Option<ConnectorHandle>,
    session: Option<SessionHandle>,
}

impl LinkCore {
    fn next_id(&mut self) -> u64 {
        self.next_worker_id += 1;
        self.next_worker_id
    }

    fn owns_connector(&self, id: u64) -> bool {
        self.connector.as_ref().map(|c| c.id()) == Some(id)
    }

    fn owns_session(&self, id: u64) -> bool {
        self.session.as_ref().map(|s| s.id()) == Some(id)
    }

    fn is_idle(&self) -> bool {
        self.state == ConnectionState::None && self.connector.is_none() && self.session.is_none()
    }
}

impl<T: Transport> LinkManager<T> {
    /// Create a manager in the `None` state.
    pub fn new(transport: T, config: LinkConfig) -> Self {
        Self {
            shared: Arc::new(LinkShared {
                transport: Arc::new(transport),
                core: Mutex::new(LinkCore::default()),
                status: LinkStatus::new(),
                dispatcher: Arc::new(EventDispatcher::new()),
                config,
            }),
        }
    }

    /// Attach a channel consumer, replacing any previous one.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<LinkEvent> {
        self.shared.dispatcher.subscribe()
    }

    /// Attach a callback consumer driven from a single task.
    pub fn register<C: LinkCallback>(&self, callback: C) -> JoinHandle<()> {
        self.shared.dispatcher.register(callback)
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.shared.dispatcher
    }

    /// Snapshot readable from any thread.
    pub fn status(&self) -> Arc<LinkStatus> {
        self.shared.status.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.status.get_state()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.status.is_connected()
    }

    pub fn peer(&self) -> Option<PeerHandle> {
        self.shared.status.get_peer()
    }

    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    /// Start connecting to `peer` unless a connect is already under way or done.
    pub async fn connect(&self, peer: PeerHandle) {
        let shared = &self.shared;
        let mut core = shared.core.lock().await;

        if matches!(
            core.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            debug!(
                "Ignoring connect to {}, link is {}",
                peer,
                core.state.as_str()
            );
            return;
        }

        info!("Connecting to {}", peer);
        shared.release_workers(&mut core).await;

        let id = core.next_id();
        core.connector = Some(spawn_connector(
            Arc::downgrade(shared),
            shared.transport.clone(),
            peer.clone(),
            id,
        ));
        shared.status.set_peer(peer);
        shared.set_state(&mut core, ConnectionState::Connecting);
    }

    /// Adopt an already open stream, replacing any connector or session.
    pub async fn on_stream_established(&self, stream: T::Stream, peer: PeerHandle) {
        let mut core = self.shared.core.lock().await;
        self.shared.release_workers(&mut core).await;
        self.shared.install_session(&mut core, stream, peer);
    }

    /// Tear down any worker and return to `None`. No-op when already idle.
    pub async fn stop(&self) {
        let mut core = self.shared.core.lock().await;
        if core.is_idle() {
            debug!("Stop ignored, link already idle");
            return;
        }

        info!("Stopping link");
        self.shared.release_workers(&mut core).await;
        self.shared.set_state(&mut core, ConnectionState::None);
    }

    /// Send `bytes` to the peer.
    ///
    /// Returns once the session has written them. When not connected an
    /// [`LinkEvent::Error`] is emitted instead and nothing is sent.
    pub async fn write(&self, bytes: impl Into<Vec<u8>>) {
        let bytes = bytes.into();

        let outbound_tx = {
            let core = self.shared.core.lock().await;
            match core.session.as_ref() {
                Some(session) if core.state == ConnectionState::Connected => {
                    Some(session.outbound())
                }
                _ => None,
            }
        };

        let Some(outbound_tx) = outbound_tx else {
            self.shared.report_not_connected();
            return;
        };

        let (done_tx, done_rx) = oneshot::channel();
        if outbound_tx
            .send(OutboundCommand::new(bytes, done_tx))
            .await
            .is_err()
        {
            self.shared.report_not_connected();
            return;
        }

        if done_rx.await.is_err() {
            debug!("Session ended before the write went out");
            self.shared.report_not_connected();
        }
    }
}

impl<T: Transport> LinkShared<T> {
    /// Set the state and notify the consumer. Callers hold the core lock.
    fn set_state(&self, core: &mut LinkCore, state: ConnectionState) {
        debug!("Link state {} -> {}", core.state.as_str(), state.as_str());
        core.state = state;
        self.status.set_state(state);
        self.dispatcher
            .emit(LinkEvent::ConnectivityChanged(state.is_connected()));
    }

    /// Cancel and join the current connector and session, if any.
    async fn release_workers(&self, core: &mut LinkCore) {
        if let Some(connector) = core.connector.take() {
            connector.shutdown().await;
        }
        if let Some(session) = core.session.take() {
            session.shutdown().await;
        }
    }

    /// Transition to `Connected` and start a session for `stream`.
    ///
    /// Callers have already released the previous workers.
    fn install_session(
        self: &Arc<Self>,
        core: &mut LinkCore,
        stream: T::Stream,
        peer: PeerHandle,
    ) {
        info!("Connected to {}", peer);
        self.status.set_peer(peer.clone());
        self.set_state(core, ConnectionState::Connected);

        let id = core.next_id();
        core.session = Some(spawn_session(
            Arc::downgrade(self),
            self.dispatcher.clone(),
            stream,
            peer,
            id,
            &self.config,
        ));
    }

    fn report_not_connected(&self) {
        warn!("Write attempted without a connection");
        self.dispatcher
            .emit(LinkEvent::Error(LinkError::NotConnected.to_string()));
    }

    /// Lock the core unless `cancel` fires first.
    async fn lock_unless_cancelled(
        &self,
        cancel: &CancellationToken,
    ) -> Option<MutexGuard<'_, LinkCore>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            core = self.core.lock() => Some(core),
        }
    }

    /// Called by connector `id` with its freshly opened stream.
    pub(crate) async fn complete_connect(
        self: &Arc<Self>,
        id: u64,
        stream: T::Stream,
        peer: PeerHandle,
        cancel: &CancellationToken,
    ) {
        let Some(mut core) = self.lock_unless_cancelled(cancel).await else {
            debug!("Connector #{} cancelled after handshake, closing stream", id);
            return;
        };
        if !core.owns_connector(id) {
            debug!("Connector #{} was replaced, closing stream", id);
            return;
        }

        // This task; it exits right after the handover.
        core.connector.take();
        self.release_workers(&mut core).await;
        self.install_session(&mut core, stream, peer);
    }

    /// Called by connector `id` when the handshake failed.
    pub(crate) async fn fail_connect(&self, id: u64, reason: String, cancel: &CancellationToken) {
        let Some(mut core) = self.lock_unless_cancelled(cancel).await else {
            return;
        };
        if !core.owns_connector(id) {
            return;
        }

        warn!("Connection failed: {}", reason);
        core.connector.take();
        self.release_workers(&mut core).await;
        self.set_state(&mut core, ConnectionState::None);
        self.dispatcher
            .emit(LinkEvent::Error(LinkError::ConnectFailed(reason).to_string()));
    }

    /// Called by session `id` when its stream ended on its own.
    pub(crate) async fn connection_lost(
        &self,
        id: u64,
        reason: LinkError,
        cancel: &CancellationToken,
    ) {
        let Some(mut core) = self.lock_unless_cancelled(cancel).await else {
            return;
        };
        if !core.owns_session(id) {
            return;
        }

        warn!("{}", reason);
        core.session.take();
        self.release_workers(&mut core).await;
        self.set_state(&mut core, ConnectionState::None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use futures::future::BoxFuture;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::time::{timeout, Duration};

    /// Hands out the near end of an in-memory pipe, or fails.
    struct PipeTransport {
        fail: bool,
        far_ends: parking_lot::Mutex<Vec<DuplexStream>>,
    }

    impl PipeTransport {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                far_ends: parking_lot::Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for PipeTransport {
        type Stream = DuplexStream;

        fn open<'a>(&'a self, _peer: &'a PeerHandle) -> BoxFuture<'a, Result<DuplexStream>> {
            Box::pin(async move {
                if self.fail {
                    return Err(anyhow!("host is down"));
                }
                let (near, far) = tokio::io::duplex(1024);
                self.far_ends.lock().push(far);
                Ok(near)
            })
        }
    }

    fn peer() -> PeerHandle {
        PeerHandle::new("ESP32", "34:5F:45:AA:B2:0A")
    }

    async fn next(event_rx: &mut mpsc::UnboundedReceiver<LinkEvent>) -> LinkEvent {
        timeout(Duration::from_secs(2), event_rx.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_connect_reaches_connected() {
        let manager = LinkManager::new(PipeTransport::new(false), LinkConfig::default());
        let mut event_rx = manager.subscribe();

        manager.connect(peer()).await;
        assert_eq!(next(&mut event_rx).await, LinkEvent::ConnectivityChanged(false));
        assert_eq!(next(&mut event_rx).await, LinkEvent::ConnectivityChanged(true));
        assert!(manager.is_connected());
        assert_eq!(manager.peer(), Some(peer()));
    }

    #[tokio::test]
    async fn test_failed_connect_reports_error() {
        let manager = LinkManager::new(PipeTransport::new(true), LinkConfig::default());
        let mut event_rx = manager.subscribe();

        manager.connect(peer()).await;
        assert_eq!(next(&mut event_rx).await, LinkEvent::ConnectivityChanged(false));
        assert_eq!(next(&mut event_rx).await, LinkEvent::ConnectivityChanged(false));
        assert_eq!(
            next(&mut event_rx).await,
            LinkEvent::Error("connection failed: host is down".to_string())
        );
        assert_eq!(manager.state(), ConnectionState::None);
        assert!(manager.peer().is_none());
    }

    #[tokio::test]
    async fn test_write_reaches_far_end() {
        let manager = LinkManager::new(PipeTransport::new(false), LinkConfig::default());
        let mut event_rx = manager.subscribe();

        manager.connect(peer()).await;
        next(&mut event_rx).await;
        next(&mut event_rx).await;

        manager.write("MOTORS:10;").await;
        let mut far = manager.transport().far_ends.lock().pop().unwrap();
        let mut buf = [0u8; 10];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"MOTORS:10;");

        far.write_all(b"ULTRASONIC:1\n").await.unwrap();
        assert_eq!(
            next(&mut event_rx).await,
            LinkEvent::MessageReceived("ULTRASONIC:1".to_string())
        );
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_silent() {
        let manager = LinkManager::new(PipeTransport::new(false), LinkConfig::default());
        let mut event_rx = manager.subscribe();

        manager.stop().await;
        assert!(event_rx.try_recv().is_err());
    }
}
