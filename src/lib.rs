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

//! Text messaging between two Bluetooth peers over RFCOMM.
//!
//! One side calls [`ConnectionManager::connect_as_client`], the other
//! [`ConnectionManager::listen_as_server`]. Either way the result is a
//! [`Session`] whose background receive loop turns raw reads into
//! [`LinkEvent`]s; text goes out through a [`MessageDispatcher`].

pub mod bluetooth;
pub mod config;
pub mod error;
pub mod events;
pub mod state;

pub use bluetooth::{
    ConnectionManager, LoopbackHub, LoopbackTransport, MessageDispatcher, PeerIdentifier,
    RfcommTransport, Session, Transport, SPP_UUID,
};
pub use config::Config;
pub use error::{LinkError, Result};
pub use events::{EventProcessor, LinkEvent, LostReason};
pub use state::{ConnectionState, Role};
