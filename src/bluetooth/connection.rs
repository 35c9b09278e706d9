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

//! Session worker owning a live stream.

use std::sync::{Arc, Weak};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::framing::MessageFramer;
use super::manager::LinkShared;
use super::transport::{PeerHandle, Transport};
use crate::config::{LinkConfig, WriteFailurePolicy};
use crate::error::LinkError;
use crate::events::{EventDispatcher, LinkEvent};

/// Outbound queue depth per session.
pub(crate) const OUTBOUND_QUEUE_CAPACITY: usize = 32;

/// One write request.
pub(crate) struct OutboundCommand {
    bytes: Vec<u8>,
    /// Signalled once the bytes were written (or the write failed).
    done: oneshot::Sender<()>,
}

impl OutboundCommand {
    pub(crate) fn new(bytes: Vec<u8>, done: oneshot::Sender<()>) -> Self {
        Self { bytes, done }
    }
}

/// Handle to a running session task.
pub(crate) struct SessionHandle {
    id: u64,
    peer: PeerHandle,
    outbound_tx: mpsc::Sender<OutboundCommand>,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn outbound(&self) -> mpsc::Sender<OutboundCommand> {
        self.outbound_tx.clone()
    }

    /// Cancel the session and wait until its stream is closed.
    pub(crate) async fn shutdown(mut self) {
        debug!("Closing session #{} with {}", self.id, self.peer);
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                error!("Session #{} ended abnormally: {}", self.id, e);
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn the read loop for `stream`.
pub(crate) fn spawn_session<T: Transport>(
    link: Weak<LinkShared<T>>,
    dispatcher: Arc<EventDispatcher>,
    stream: T::Stream,
    peer: PeerHandle,
    id: u64,
    config: &LinkConfig,
) -> SessionHandle {
    let cancel = CancellationToken::new();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);

    let join = tokio::spawn(run_session(
        link,
        dispatcher,
        stream,
        id,
        config.clone(),
        outbound_rx,
        cancel.clone(),
    ));

    SessionHandle {
        id,
        peer,
        outbound_tx,
        cancel,
        join: Some(join),
    }
}

async fn run_session<T: Transport>(
    link: Weak<LinkShared<T>>,
    dispatcher: Arc<EventDispatcher>,
    stream: T::Stream,
    id: u64,
    config: LinkConfig,
    mut outbound_rx: mpsc::Receiver<OutboundCommand>,
    cancel: CancellationToken,
) {
    info!("Session #{} started", id);

    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut buf = vec![0u8; config.read_buffer_size.max(1)];
    let mut framer = MessageFramer::new(config.framing);

    let reason = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Session #{} cancelled, closing stream", id);
                return;
            }
            Some(command) = outbound_rx.recv() => {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Session #{} cancelled mid-write", id);
                        return;
                    }
                    result = write_command(&mut writer, &command.bytes) => result,
                };
                let _ = command.done.send(());

                match result {
                    Ok(()) => debug!("Sent {} bytes", command.bytes.len()),
                    Err(e) => {
                        error!("Failed to send: {}", e);
                        if config.write_failure == WriteFailurePolicy::Disconnect {
                            break LinkError::WriteFailed(e.to_string());
                        }
                    }
                }
            }
            result = reader.read(&mut buf) => match result {
                Ok(0) => {
                    info!("Connection closed by remote");
                    break LinkError::ConnectionLost("end of stream".to_string());
                }
                Ok(n) => {
                    for message in framer.push(&buf[..n]) {
                        debug!("Received: {}", message);
                        dispatcher.emit(LinkEvent::MessageReceived(message));
                    }
                }
                Err(e) => {
                    error!("Read error: {}", e);
                    break LinkError::ConnectionLost(e.to_string());
                }
            }
        }
    };

    if framer.is_in_progress() {
        debug!("Dropping {} bytes of an unterminated line", framer.buffer_size());
    }

    // Close the stream and refuse queued writes before the link reports the loss.
    drop(reader);
    drop(writer);
    drop(outbound_rx);

    if let Some(link) = link.upgrade() {
        link.connection_lost(id, reason, &cancel).await;
    }
}

async fn write_command<W>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await
}
