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

//! Outbound message dispatch.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::slot::LinkSlot;
use crate::error::{LinkError, Result};
use crate::events::LinkEvent;

/// Sends text over whichever session currently owns the slot.
///
/// A failed send is returned to the caller and also announced as
/// [`LinkEvent::SendFailed`]. Write failures do not close the session; the
/// receive loop is responsible for noticing a dead channel.
#[derive(Clone)]
pub struct MessageDispatcher {
    slot: Arc<LinkSlot>,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl MessageDispatcher {
    pub(crate) fn new(slot: Arc<LinkSlot>, events: mpsc::UnboundedSender<LinkEvent>) -> Self {
        Self { slot, events }
    }

    /// Send `text` as raw UTF-8 bytes.
    pub async fn send(&self, text: &str) -> Result<()> {
        let result = match self.slot.active() {
            Some(active) => active.link.write(text.as_bytes()).await,
            None => Err(LinkError::NotConnected),
        };

        match result {
            Ok(()) => {
                debug!("Sent {} bytes", text.len());
                Ok(())
            }
            Err(e) => {
                if self.events.send(LinkEvent::SendFailed(e.to_string())).is_err() {
                    warn!("Event receiver dropped, send failure not delivered");
                }
                Err(e)
            }
        }
    }
}
