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

//! In-memory transport.
//!
//! A [`LoopbackHub`] plays the radio: every [`LoopbackTransport`] created from
//! it is one local device, and connecting to a peer's address reaches the
//! listener that peer registered for the same service UUID. Links can be
//! severed, write paths broken and listeners closed from outside, which is
//! how lifecycle failures are reproduced without hardware.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use bluer::Address;
use futures::task::AtomicWaker;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::peer::PeerIdentifier;
use super::transport::{Listener, Transport};
use crate::error::{LinkError, Result};

/// Bytes buffered in each direction of a loopback link.
const LINK_BUFFER: usize = 64 * 1024;

#[derive(Debug)]
struct Incoming {
    stream: LoopbackStream,
    from: PeerIdentifier,
}

#[derive(Debug)]
struct Registration {
    id: u64,
    tx: mpsc::Sender<Incoming>,
}

/// Fault switches shared by both ends of one link.
#[derive(Debug)]
struct LinkFault {
    ends: [Address; 2],
    severed: AtomicBool,
    writes_broken: [AtomicBool; 2],
    wakers: [AtomicWaker; 2],
}

impl LinkFault {
    fn new(client: Address, server: Address) -> Self {
        Self {
            ends: [client, server],
            severed: AtomicBool::new(false),
            writes_broken: [AtomicBool::new(false), AtomicBool::new(false)],
            wakers: [AtomicWaker::new(), AtomicWaker::new()],
        }
    }

    fn involves(&self, address: Address) -> bool {
        self.ends.contains(&address)
    }

    fn sever(&self) {
        self.severed.store(true, Ordering::SeqCst);
        for waker in &self.wakers {
            waker.wake();
        }
    }
}

#[derive(Debug, Default)]
struct HubState {
    listeners: HashMap<(Address, Uuid), Registration>,
    links: Vec<Weak<LinkFault>>,
}

/// Shared medium connecting loopback transports.
#[derive(Debug, Clone, Default)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
    next_id: Arc<AtomicU64>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the transport of a local device with the given identity.
    pub fn transport(&self, local: PeerIdentifier) -> LoopbackTransport {
        LoopbackTransport {
            hub: self.clone(),
            local,
            available: Arc::new(AtomicBool::new(true)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Whether `address` is currently listening for `service`.
    pub fn is_listening(&self, address: Address, service: Uuid) -> bool {
        self.state.lock().listeners.contains_key(&(address, service))
    }

    /// Close every listening channel of `address`; pending accepts fail.
    pub fn close_listener(&self, address: Address) -> bool {
        let mut state = self.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(addr, _), _| *addr != address);
        before != state.listeners.len()
    }

    /// Cut every link touching `address`. Reads and writes on both ends fail.
    pub fn sever(&self, address: Address) -> usize {
        let mut state = self.state.lock();
        let mut severed = 0;
        state.links.retain(|link| match link.upgrade() {
            Some(link) if link.involves(address) => {
                link.sever();
                severed += 1;
                false
            }
            Some(_) => true,
            None => false,
        });
        debug!("Severed {} loopback link(s) of {}", severed, address);
        severed
    }

    /// Make writes from `address` fail while its reads keep working.
    pub fn break_writes(&self, address: Address) {
        let state = self.state.lock();
        for link in state.links.iter().filter_map(Weak::upgrade) {
            for (side, end) in link.ends.iter().enumerate() {
                if *end == address {
                    link.writes_broken[side].store(true, Ordering::SeqCst);
                }
            }
        }
    }

    #[cfg(test)]
    fn tracked_links(&self) -> usize {
        self.state.lock().links.len()
    }

    fn register(&self, key: (Address, Uuid)) -> Result<LoopbackListener> {
        let mut state = self.state.lock();
        if state.listeners.contains_key(&key) {
            return Err(LinkError::Transport(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("service {} already registered on {}", key.1, key.0),
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(1);
        state.listeners.insert(key, Registration { id, tx });

        Ok(LoopbackListener {
            hub: self.clone(),
            key,
            id,
            rx,
        })
    }

    fn unregister(&self, key: &(Address, Uuid), id: u64) {
        let mut state = self.state.lock();
        if state.listeners.get(key).is_some_and(|reg| reg.id == id) {
            state.listeners.remove(key);
        }
    }

    fn open_link(&self, client: Address, server: Address) -> (LoopbackStream, LoopbackStream) {
        let (client_io, server_io) = tokio::io::duplex(LINK_BUFFER);
        let fault = Arc::new(LinkFault::new(client, server));

        // Links whose ends were both dropped are forgotten here
        let mut state = self.state.lock();
        state.links.retain(|link| link.strong_count() > 0);
        state.links.push(Arc::downgrade(&fault));
        drop(state);

        (
            LoopbackStream {
                inner: client_io,
                fault: fault.clone(),
                side: 0,
            },
            LoopbackStream {
                inner: server_io,
                fault,
                side: 1,
            },
        )
    }
}

/// One local device attached to a [`LoopbackHub`].
///
/// Clones share the availability switch and the call counter.
#[derive(Clone)]
pub struct LoopbackTransport {
    hub: LoopbackHub,
    local: PeerIdentifier,
    available: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl LoopbackTransport {
    /// Simulate the adapter being switched off or on.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of connect and listen calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LinkError::TransportUnavailable(format!(
                "adapter of {} is powered off",
                self.local.address()
            )))
        }
    }
}

impl Transport for LoopbackTransport {
    type Stream = LoopbackStream;
    type Listener = LoopbackListener;

    async fn connect(&self, peer: &PeerIdentifier, service: Uuid) -> Result<LoopbackStream> {
        self.enter()?;

        let tx = self
            .hub
            .state
            .lock()
            .listeners
            .get(&(peer.address(), service))
            .map(|reg| reg.tx.clone());
        let tx = tx.ok_or_else(|| {
            LinkError::Transport(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("no service {} on {}", service, peer.address()),
            ))
        })?;

        let (client, server) = self.hub.open_link(self.local.address(), peer.address());
        tx.send(Incoming {
            stream: server,
            from: self.local.clone(),
        })
        .await
        .map_err(|_| {
            LinkError::Transport(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "listener closed",
            ))
        })?;

        Ok(client)
    }

    async fn listen(&self, service: Uuid) -> Result<LoopbackListener> {
        self.enter()?;
        self.hub.register((self.local.address(), service))
    }
}

/// Listening channel on a loopback device.
#[derive(Debug)]
pub struct LoopbackListener {
    hub: LoopbackHub,
    key: (Address, Uuid),
    id: u64,
    rx: mpsc::Receiver<Incoming>,
}

impl Listener for LoopbackListener {
    type Stream = LoopbackStream;

    async fn accept(&mut self) -> Result<(LoopbackStream, PeerIdentifier)> {
        match self.rx.recv().await {
            Some(incoming) => Ok((incoming.stream, incoming.from)),
            None => Err(LinkError::Transport(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "listening channel closed",
            ))),
        }
    }
}

impl Drop for LoopbackListener {
    fn drop(&mut self) {
        self.hub.unregister(&self.key, self.id);
    }
}

/// One end of a loopback link.
#[derive(Debug)]
pub struct LoopbackStream {
    inner: DuplexStream,
    fault: Arc<LinkFault>,
    side: usize,
}

impl LoopbackStream {
    fn severed(&self) -> bool {
        self.fault.severed.load(Ordering::SeqCst)
    }
}

impl AsyncRead for LoopbackStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.fault.wakers[this.side].register(cx.waker());
        if this.severed() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "link severed",
            )));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for LoopbackStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.severed() || this.fault.writes_broken[this.side].load(Ordering::SeqCst) {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "link write path broken",
            )));
        }
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
