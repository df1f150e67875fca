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

//! Connection manager: owns the single connection slot.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::dispatcher::MessageDispatcher;
use super::peer::PeerIdentifier;
use super::session::{ReceiveLoop, Session, SessionLink};
use super::slot::{ActiveConnection, Attempt, LinkSlot};
use super::transport::{Listener, Transport, SPP_UUID};
use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::events::LinkEvent;
use crate::state::{ConnectionState, Role};

/// Why a transport step did not produce a result.
enum Interrupted {
    Cancelled,
    TimedOut(Duration),
    Failed(LinkError),
}

impl Interrupted {
    fn describe(self) -> String {
        match self {
            Interrupted::Cancelled => "cancelled".to_string(),
            Interrupted::TimedOut(limit) => format!("timed out after {}s", limit.as_secs()),
            Interrupted::Failed(e) => e.to_string(),
        }
    }
}

/// Run one transport step, honouring cancellation and an optional deadline.
async fn guarded<T>(
    cancel: &CancellationToken,
    limit: Option<Duration>,
    step: impl Future<Output = Result<T>>,
) -> std::result::Result<T, Interrupted> {
    let step = async {
        match limit {
            Some(limit) => match time::timeout(limit, step).await {
                Ok(result) => result.map_err(Interrupted::Failed),
                Err(_) => Err(Interrupted::TimedOut(limit)),
            },
            None => step.await.map_err(Interrupted::Failed),
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        result = step => result,
    }
}

/// Owns the connection slot and opens sessions over a [`Transport`].
pub struct ConnectionManager<T: Transport> {
    transport: T,
    service: Uuid,
    config: LinkConfig,
    slot: Arc<LinkSlot>,
    event_tx: mpsc::UnboundedSender<LinkEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<LinkEvent>>,
}

impl<T: Transport> ConnectionManager<T> {
    /// Create a manager using the standard SPP service.
    pub fn new(transport: T, config: LinkConfig) -> Self {
        Self::with_service(transport, SPP_UUID, config)
    }

    /// Create a manager rendezvousing on a custom service UUID.
    pub fn with_service(transport: T, service: Uuid, config: LinkConfig) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            service,
            config,
            slot: Arc::new(LinkSlot::new()),
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<LinkEvent>> {
        self.event_rx.take()
    }

    pub fn state(&self) -> ConnectionState {
        self.slot.state()
    }

    /// Peer of the active connection, if any.
    pub fn active_peer(&self) -> Option<PeerIdentifier> {
        self.slot.active().map(|active| active.peer)
    }

    /// Role of the active connection, if any.
    pub fn active_role(&self) -> Option<Role> {
        self.slot.active().map(|active| active.role)
    }

    /// Get a dispatcher for sending over whatever session is active.
    pub fn dispatcher(&self) -> MessageDispatcher {
        MessageDispatcher::new(self.slot.clone(), self.event_tx.clone())
    }

    /// Connect to `peer` as the initiating side.
    pub async fn connect_as_client(&self, peer: &PeerIdentifier) -> Result<Session> {
        let attempt = self.claim(ConnectionState::Connecting)?;
        info!("Connecting to {}...", peer);

        let connect = self.transport.connect(peer, self.service);
        let result = guarded(&attempt.cancel, self.config.connect_timeout(), connect).await;
        match result {
            Ok(stream) => Ok(self.establish(attempt, Role::Client, peer.clone(), stream)),
            Err(Interrupted::Failed(e)) if e.is_unavailable() => Err(e),
            Err(interrupted) => {
                let reason = interrupted.describe();
                error!("Connection to {} failed: {}", peer, reason);
                Err(LinkError::ConnectFailed {
                    peer: peer.address(),
                    reason,
                })
            }
        }
    }

    /// Wait for exactly one inbound connection.
    pub async fn listen_as_server(&self) -> Result<Session> {
        let attempt = self.claim(ConnectionState::Listening)?;
        info!("Listening for a connection on service {}", self.service);

        let accepted = async {
            let mut listener = self.transport.listen(self.service).await?;
            info!("Waiting for connections...");
            let accepted = listener.accept().await;
            // Single-shot: no further peers are accepted.
            drop(listener);
            accepted
        };

        let result = guarded(&attempt.cancel, self.config.accept_timeout(), accepted).await;
        match result {
            Ok((stream, peer)) => {
                info!("Connection from: {}", peer);
                Ok(self.establish(attempt, Role::Server, peer, stream))
            }
            Err(Interrupted::Failed(e)) if e.is_unavailable() => Err(e),
            Err(interrupted) => {
                let reason = interrupted.describe();
                error!("Accept error: {}", reason);
                Err(LinkError::AcceptFailed(reason))
            }
        }
    }

    /// Cancel an in-flight connect or listen. Returns whether one was pending.
    pub fn cancel_pending(&self) -> bool {
        let cancelled = self.slot.cancel_pending();
        if cancelled {
            info!("Pending connection attempt cancelled");
        }
        cancelled
    }

    /// Close the active connection.
    pub fn disconnect(&self) -> Result<()> {
        let active = self.slot.active().ok_or(LinkError::NotConnected)?;
        if active.link.close(&self.slot) {
            info!("Disconnected from {}", active.peer);
        }
        Ok(())
    }

    fn claim(&self, next: ConnectionState) -> Result<Attempt> {
        self.slot.begin(next).map_err(|e| {
            warn!("Rejecting {:?} attempt: {}", next, e);
            if self.event_tx.send(LinkEvent::Busy).is_err() {
                warn!("Event receiver dropped, busy notification not delivered");
            }
            e
        })
    }

    /// Install the new connection and start its receive loop.
    ///
    /// Nothing here awaits, so a caller dropping the connect future cannot
    /// leave an installed connection without a reader.
    fn establish(
        &self,
        attempt: Attempt,
        role: Role,
        peer: PeerIdentifier,
        stream: T::Stream,
    ) -> Session {
        let (reader, writer) = tokio::io::split(stream);
        let link = Arc::new(SessionLink::new(
            attempt.generation,
            peer.address(),
            Box::new(writer),
            self.config.write_timeout(),
            self.event_tx.clone(),
        ));

        link.install(
            &self.slot,
            attempt,
            ActiveConnection {
                role,
                peer: peer.clone(),
                link: link.clone(),
            },
        );
        info!("Connected to {} as {}", peer, role);

        ReceiveLoop {
            reader: Box::new(reader),
            link: link.clone(),
            slot: self.slot.clone(),
            buffer_size: self.config.buffer_size.max(1),
        }
        .spawn();

        Session::new(role, peer, link, self.slot.clone())
    }
}
