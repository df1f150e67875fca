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

//! Link events and their presentation.

use std::fmt;
use std::io::Write;

use tracing::{debug, info, warn};

use crate::bluetooth::PeerIdentifier;
use crate::state::Role;

/// Events emitted by the connection manager, sessions and dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Connection established.
    Connected { peer: PeerIdentifier, role: Role },
    /// Text received from the peer.
    MessageReceived(String),
    /// The session ended.
    ConnectionLost(LostReason),
    /// A send was rejected or failed.
    SendFailed(String),
    /// A connect or listen request found the slot occupied.
    Busy,
}

impl LinkEvent {
    /// Human-readable notification for this event.
    pub fn notification(&self) -> String {
        match self {
            LinkEvent::Connected {
                peer,
                role: Role::Client,
            } => format!("Connected to {}", peer.display_name()),
            LinkEvent::Connected {
                peer,
                role: Role::Server,
            } => format!("Connected as server to {}", peer.display_name()),
            LinkEvent::MessageReceived(text) => format!("Received message: {}", text),
            LinkEvent::ConnectionLost(reason) => format!("Connection lost: {}", reason),
            LinkEvent::SendFailed(reason) => format!("Failed to send message: {}", reason),
            LinkEvent::Busy => "Already connected to a device".to_string(),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LostReason {
    /// The peer closed the channel.
    ClosedByPeer,
    /// This side disconnected.
    ClosedLocally,
    /// A read on the channel failed.
    ReadFailed(String),
}

impl fmt::Display for LostReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LostReason::ClosedByPeer => f.write_str("closed by remote device"),
            LostReason::ClosedLocally => f.write_str("disconnected"),
            LostReason::ReadFailed(e) => write!(f, "read failed: {}", e),
        }
    }
}

/// Writes one notification line per event to an output sink.
pub struct EventProcessor<W: Write> {
    out: W,
    received: u64,
    last_message: Option<String>,
}

impl<W: Write> EventProcessor<W> {
    /// Create a new event processor.
    pub fn new(out: W) -> Self {
        Self {
            out,
            received: 0,
            last_message: None,
        }
    }

    /// Process a single event.
    ///
    /// Returns `false` once the session is over.
    pub fn process_event(&mut self, event: &LinkEvent) -> std::io::Result<bool> {
        let keep_running = match event {
            LinkEvent::Connected { peer, role } => {
                info!("Device connected: {} as {}", peer, role);
                true
            }
            LinkEvent::MessageReceived(text) => {
                debug!("Processing text: {} chars", text.len());
                self.received += 1;
                self.last_message = Some(text.clone());
                true
            }
            LinkEvent::ConnectionLost(reason) => {
                info!("Device disconnected: {}", reason);
                false
            }
            LinkEvent::SendFailed(reason) => {
                warn!("Send failed: {}", reason);
                true
            }
            LinkEvent::Busy => true,
        };

        writeln!(self.out, "{}", event.notification())?;
        self.out.flush()?;
        Ok(keep_running)
    }

    /// Number of messages received so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluer::Address;

    fn peer() -> PeerIdentifier {
        PeerIdentifier::new(Address::new([1, 2, 3, 4, 5, 6])).with_name("Phone B")
    }

    #[test]
    fn test_notifications() {
        assert_eq!(
            LinkEvent::Connected {
                peer: peer(),
                role: Role::Client
            }
            .notification(),
            "Connected to Phone B"
        );
        assert_eq!(
            LinkEvent::MessageReceived("hi".into()).notification(),
            "Received message: hi"
        );
        assert_eq!(
            LinkEvent::ConnectionLost(LostReason::ReadFailed("reset".into())).notification(),
            "Connection lost: read failed: reset"
        );
    }

    #[test]
    fn test_processor_writes_one_line_per_event() {
        let mut processor = EventProcessor::new(Vec::new());

        assert!(processor
            .process_event(&LinkEvent::Connected {
                peer: peer(),
                role: Role::Server
            })
            .unwrap());
        assert!(processor
            .process_event(&LinkEvent::MessageReceived("ping".into()))
            .unwrap());
        assert!(processor.process_event(&LinkEvent::Busy).unwrap());
        assert!(!processor
            .process_event(&LinkEvent::ConnectionLost(LostReason::ClosedByPeer))
            .unwrap());

        assert_eq!(processor.received(), 1);
        assert_eq!(processor.last_message(), Some("ping"));

        let output = String::from_utf8(processor.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Connected as server to Phone B",
                "Received message: ping",
                "Already connected to a device",
                "Connection lost: closed by remote device",
            ]
        );
    }
}
