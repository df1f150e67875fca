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

//! Transport abstraction over serial-emulation channels.
//!
//! The connection manager only needs two things from a transport: open an
//! outbound stream to a peer's service, and wait for one inbound stream on
//! our own service. [`RfcommTransport`](super::RfcommTransport) provides them
//! over BlueZ, [`LoopbackHub`](super::LoopbackHub) in memory.

use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};
use uuid::Uuid;

use super::peer::PeerIdentifier;
use crate::error::Result;

/// Standard SPP UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// A point-to-point byte stream transport.
///
/// Implementations report a missing or disabled adapter as
/// [`LinkError::TransportUnavailable`](crate::LinkError::TransportUnavailable);
/// any other error is treated as a failure of the single attempt.
pub trait Transport: Send + Sync + 'static {
    /// Established bidirectional channel.
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Listening channel produced by [`Transport::listen`].
    type Listener: Listener<Stream = Self::Stream>;

    /// Open a channel to `service` on `peer`.
    fn connect(
        &self,
        peer: &PeerIdentifier,
        service: Uuid,
    ) -> impl Future<Output = Result<Self::Stream>> + Send;

    /// Start accepting channels for `service`.
    fn listen(&self, service: Uuid) -> impl Future<Output = Result<Self::Listener>> + Send;
}

/// Listening side of a transport. Dropping it stops listening.
pub trait Listener: Send {
    type Stream;

    /// Wait for the next inbound channel.
    fn accept(&mut self) -> impl Future<Output = Result<(Self::Stream, PeerIdentifier)>> + Send;
}
