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

//! Bluetooth communication module.
//!
//! Handles the single RFCOMM connection: opening it as client or server,
//! the receive loop of the established session, and outbound dispatch.

mod connection;
mod decoder;
mod dispatcher;
mod loopback;
mod peer;
mod rfcomm;
mod session;
mod slot;
mod transport;

pub use connection::ConnectionManager;
pub use decoder::Utf8StreamDecoder;
pub use dispatcher::MessageDispatcher;
pub use loopback::{LoopbackHub, LoopbackListener, LoopbackStream, LoopbackTransport};
pub use peer::PeerIdentifier;
pub use rfcomm::{RfcommListener, RfcommTransport};
pub use session::Session;
pub use transport::{Listener, Transport, SPP_UUID};
