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

//! Connection state shared by the manager and its sessions.

use std::fmt;

/// Lifecycle state of the connection slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Nothing in progress.
    #[default]
    Idle,
    /// Outbound connect attempt in flight.
    Connecting,
    /// Waiting for one inbound connection.
    Listening,
    /// A session owns the slot.
    Connected,
    /// The last session ended; the slot is free again.
    Lost,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Listening => "Listening...",
            ConnectionState::Connected => "Connected",
            ConnectionState::Lost => "Connection lost",
        }
    }

    /// Whether a new connect or listen request must be rejected.
    pub fn is_occupied(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Listening | ConnectionState::Connected
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side opened the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Server => "server",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupied_states() {
        assert!(!ConnectionState::Idle.is_occupied());
        assert!(!ConnectionState::Lost.is_occupied());
        assert!(ConnectionState::Connecting.is_occupied());
        assert!(ConnectionState::Listening.is_occupied());
        assert!(ConnectionState::Connected.is_occupied());
    }

    #[test]
    fn test_default_is_idle() {
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
    }
}
