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

//! Background connect attempt.

use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::manager::LinkShared;
use super::transport::{PeerHandle, Transport};

/// Handle to a running connector task.
///
/// Dropping the handle cancels the attempt; [`ConnectorHandle::shutdown`]
/// also waits for the task to finish.
pub(crate) struct ConnectorHandle {
    id: u64,
    peer: PeerHandle,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl ConnectorHandle {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Cancel the attempt and wait until the task has released its socket.
    pub(crate) async fn shutdown(mut self) {
        debug!("Cancelling connector #{} for {}", self.id, self.peer);
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                error!("Connector #{} ended abnormally: {}", self.id, e);
            }
        }
    }
}

impl Drop for ConnectorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn a task that opens a stream to `peer` and reports back to the link.
pub(crate) fn spawn_connector<T: Transport>(
    link: Weak<LinkShared<T>>,
    transport: Arc<T>,
    peer: PeerHandle,
    id: u64,
) -> ConnectorHandle {
    let cancel = CancellationToken::new();
    let join = tokio::spawn(run_connector(
        link,
        transport,
        peer.clone(),
        id,
        cancel.clone(),
    ));

    ConnectorHandle {
        id,
        peer,
        cancel,
        join: Some(join),
    }
}

async fn run_connector<T: Transport>(
    link: Weak<LinkShared<T>>,
    transport: Arc<T>,
    peer: PeerHandle,
    id: u64,
    cancel: CancellationToken,
) {
    info!("Connector #{} opening stream to {}", id, peer);

    // Dropping the open future on cancellation closes a half-open socket.
    let attempt = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Connector #{} cancelled during handshake", id);
            return;
        }
        result = transport.open(&peer) => result,
    };

    let Some(link) = link.upgrade() else {
        debug!("Connector #{} outlived its link", id);
        return;
    };

    match attempt {
        Ok(stream) => link.complete_connect(id, stream, peer, &cancel).await,
        Err(e) => link.fail_connect(id, format!("{:#}", e), &cancel).await,
    }
}
