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

//! Peer identification.

use bluer::Address;
use std::fmt;

/// A remote device as supplied by the device directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerIdentifier {
    address: Address,
    name: Option<String>,
}

impl PeerIdentifier {
    /// Create a peer without a display name.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            name: None,
        }
    }

    /// Attach a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name to show to the user, falling back to "Unknown".
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}

impl From<Address> for PeerIdentifier {
    fn from(address: Address) -> Self {
        Self::new(address)
    }
}

impl fmt::Display for PeerIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.display_name(), self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_and_without_name() {
        let addr = Address::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(PeerIdentifier::new(addr).to_string(), "Unknown - 00:11:22:33:44:55");
        assert_eq!(
            PeerIdentifier::new(addr).with_name("Pixel").to_string(),
            "Pixel - 00:11:22:33:44:55"
        );
    }
}
