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

//! Error types for the messaging link.
//!
//! Every failure the connection subsystem can report maps to exactly one
//! variant here, and every variant renders as a single human-readable line.

use bluer::Address;
use thiserror::Error;

/// Errors produced by the connection manager, sessions and dispatcher.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Bluetooth is not available: {0}")]
    TransportUnavailable(String),

    #[error("Failed to connect to {peer}: {reason}")]
    ConnectFailed { peer: Address, reason: String },

    #[error("Failed to accept a connection: {0}")]
    AcceptFailed(String),

    #[error("A connection is already active or in progress")]
    Busy,

    #[error("Not connected to any device")]
    NotConnected,

    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] bluer::Error),
}

impl LinkError {
    /// Whether this error reports a missing or disabled adapter.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::TransportUnavailable(_))
    }
}

/// Convenience type alias for Results with `LinkError`.
pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_single_line() {
        let errors = [
            LinkError::TransportUnavailable("no adapter".into()),
            LinkError::ConnectFailed {
                peer: Address::new([0, 1, 2, 3, 4, 5]),
                reason: "refused".into(),
            },
            LinkError::AcceptFailed("listener closed".into()),
            LinkError::Busy,
            LinkError::NotConnected,
            LinkError::Transport(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "pipe",
            )),
        ];

        for err in errors {
            let text = err.to_string();
            assert!(!text.is_empty());
            assert!(!text.contains('\n'));
        }
    }

    #[test]
    fn test_connect_failed_names_peer() {
        let err = LinkError::ConnectFailed {
            peer: Address::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
            reason: "timed out".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to connect to AA:BB:CC:DD:EE:FF: timed out"
        );
    }
}
