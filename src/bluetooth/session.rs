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

//! Established sessions and their receive loop.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bluer::Address;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::decoder::Utf8StreamDecoder;
use super::peer::PeerIdentifier;
use super::slot::{ActiveConnection, Attempt, LinkSlot};
use crate::error::{LinkError, Result};
use crate::events::{LinkEvent, LostReason};
use crate::state::Role;

pub(crate) type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub(crate) type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Upper bound for shutting down the write half once the session is lost.
const WRITER_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared half of a session: the write side plus its lifecycle flags.
///
/// Events of the session are emitted under the `lost` lock, and the slot is
/// only released after `ConnectionLost` was queued. A consumer therefore sees
/// every event of one session before the `Connected` of the next.
pub(crate) struct SessionLink {
    generation: u64,
    peer: Address,
    writer: AsyncMutex<BoxedWriter>,
    write_timeout: Option<Duration>,
    events: mpsc::UnboundedSender<LinkEvent>,
    shutdown: CancellationToken,
    closed: CancellationToken,
    lost: Mutex<bool>,
}

impl SessionLink {
    pub(crate) fn new(
        generation: u64,
        peer: Address,
        writer: BoxedWriter,
        write_timeout: Option<Duration>,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Self {
        Self {
            generation,
            peer,
            writer: AsyncMutex::new(writer),
            write_timeout,
            events,
            shutdown: CancellationToken::new(),
            closed: CancellationToken::new(),
            lost: Mutex::new(false),
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn is_lost(&self) -> bool {
        *self.lost.lock()
    }

    /// Install this link in the slot and announce it.
    pub(crate) fn install(&self, slot: &LinkSlot, attempt: Attempt, connection: ActiveConnection) {
        let _lost = self.lost.lock();
        let connected = LinkEvent::Connected {
            peer: connection.peer.clone(),
            role: connection.role,
        };
        slot.install(attempt, connection);
        if self.events.send(connected).is_err() {
            warn!("Event receiver dropped before session with {} started", self.peer);
        }
    }

    /// Queue received text. Returns `false` once the session is lost or
    /// nobody listens any more.
    fn emit_message(&self, text: String) -> bool {
        let lost = self.lost.lock();
        if *lost {
            return false;
        }
        self.events.send(LinkEvent::MessageReceived(text)).is_ok()
    }

    /// Write and flush `bytes`. Concurrent callers are serialized.
    pub(crate) async fn write(&self, bytes: &[u8]) -> Result<()> {
        if self.is_lost() {
            return Err(LinkError::NotConnected);
        }

        let mut writer = self.writer.lock().await;
        trace!("→ {}: {}", self.peer, hex::encode(bytes));

        let io = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        };
        let result = match self.write_timeout {
            Some(limit) => time::timeout(limit, io).await.unwrap_or_else(|_| {
                Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "write timed out",
                ))
            }),
            None => io.await,
        };

        result.map_err(|e| {
            warn!("Failed to send data to {}: {}", self.peer, e);
            LinkError::Transport(e)
        })
    }

    /// Move to Lost, queue `ConnectionLost` and release the slot.
    /// Only the first call has an effect.
    pub(crate) fn mark_lost(&self, slot: &LinkSlot, reason: LostReason) -> bool {
        let mut lost = self.lost.lock();
        if *lost {
            return false;
        }
        *lost = true;

        info!("Session with {} lost: {}", self.peer, reason);
        if self.events.send(LinkEvent::ConnectionLost(reason)).is_err() {
            debug!("Event receiver gone, loss of {} not delivered", self.peer);
        }
        slot.release(self.generation);
        true
    }

    /// Mark lost and stop the receive loop.
    pub(crate) fn close(&self, slot: &LinkSlot) -> bool {
        let first = self.mark_lost(slot, LostReason::ClosedLocally);
        self.shutdown.cancel();
        first
    }
}

/// Background reader for one session.
///
/// Emits one `MessageReceived` per non-empty read until the session is lost.
/// Emitting never waits, so a slow consumer cannot keep a dead link alive.
pub(crate) struct ReceiveLoop {
    pub(crate) reader: BoxedReader,
    pub(crate) link: Arc<SessionLink>,
    pub(crate) slot: Arc<LinkSlot>,
    pub(crate) buffer_size: usize,
}

impl ReceiveLoop {
    pub(crate) fn spawn(self) {
        tokio::spawn(self.run());
    }

    async fn run(mut self) {
        let peer = self.link.peer;
        info!("Receive loop started for {}", peer);

        let mut buf = vec![0u8; self.buffer_size];
        let mut decoder = Utf8StreamDecoder::new();

        let reason = loop {
            let read = tokio::select! {
                biased;
                _ = self.link.shutdown.cancelled() => break LostReason::ClosedLocally,
                read = self.reader.read(&mut buf) => read,
            };

            match read {
                Ok(0) => {
                    info!("Connection closed by remote");
                    break LostReason::ClosedByPeer;
                }
                Ok(n) => {
                    trace!("← {}: {}", peer, hex::encode(&buf[..n]));
                    let text = decoder.decode(&buf[..n]);
                    if text.is_empty() {
                        continue;
                    }
                    debug!("Received {} bytes from {}", n, peer);
                    if !self.link.emit_message(text) {
                        break LostReason::ClosedLocally;
                    }
                }
                Err(e) => {
                    error!("Read error: {}", e);
                    break LostReason::ReadFailed(e.to_string());
                }
            }
        };

        let tail = decoder.finish();
        if !tail.is_empty() {
            self.link.emit_message(tail);
        }
        self.link.mark_lost(&self.slot, reason);

        let close = async {
            let mut writer = self.link.writer.lock().await;
            writer.shutdown().await
        };
        match time::timeout(WRITER_CLOSE_TIMEOUT, close).await {
            Ok(Err(e)) => debug!("Shutting down write half failed: {}", e),
            Err(_) => debug!("Shutting down write half timed out"),
            Ok(Ok(())) => {}
        }

        debug!("Receive loop for {} finished", peer);
        self.link.closed.cancel();
    }
}

/// One established channel between this device and a peer.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct Session {
    role: Role,
    peer: PeerIdentifier,
    link: Arc<SessionLink>,
    slot: Arc<LinkSlot>,
}

impl Session {
    pub(crate) fn new(
        role: Role,
        peer: PeerIdentifier,
        link: Arc<SessionLink>,
        slot: Arc<LinkSlot>,
    ) -> Self {
        Self {
            role,
            peer,
            link,
            slot,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn peer(&self) -> &PeerIdentifier {
        &self.peer
    }

    /// Whether this session has reached its terminal state.
    pub fn is_lost(&self) -> bool {
        self.link.is_lost()
    }

    /// Write raw bytes to the peer.
    ///
    /// Returns once the bytes are handed to the transport; there is no
    /// acknowledgment from the other side.
    pub async fn send(&self, bytes: &[u8]) -> Result<()> {
        if !self.slot.is_current(self.link.generation()) {
            return Err(LinkError::NotConnected);
        }
        self.link.write(bytes).await
    }

    /// Close the session. The slot is free again when this returns.
    pub fn disconnect(&self) {
        if self.link.close(&self.slot) {
            info!("Disconnected from {}", self.peer);
        }
    }

    /// Wait until the receive loop has finished and `ConnectionLost` was emitted.
    pub async fn closed(&self) {
        self.link.closed.cancelled().await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("role", &self.role)
            .field("peer", &self.peer)
            .field("lost", &self.is_lost())
            .finish()
    }
}
