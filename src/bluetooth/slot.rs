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

//! The single connection slot.
//!
//! Every state change goes through one mutex, so a connect racing another
//! connect (or a release racing a new attempt) can never leave two sessions
//! installed. Each attempt gets a fresh generation number; a session may only
//! release the slot while its own generation is installed. The lock is never
//! held across an await point.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::peer::PeerIdentifier;
use super::session::SessionLink;
use crate::error::{LinkError, Result};
use crate::state::{ConnectionState, Role};

/// The connection currently owning the slot.
#[derive(Clone)]
pub(crate) struct ActiveConnection {
    pub(crate) role: Role,
    pub(crate) peer: PeerIdentifier,
    pub(crate) link: Arc<SessionLink>,
}

/// Claim on the slot for one in-flight connect or listen.
///
/// Dropping an attempt that was never installed returns the slot to idle,
/// so an abandoned connect future cannot leave the slot occupied.
pub(crate) struct Attempt {
    slot: Arc<LinkSlot>,
    pub(crate) generation: u64,
    pub(crate) cancel: CancellationToken,
    installed: bool,
}

impl Drop for Attempt {
    fn drop(&mut self) {
        if !self.installed {
            self.slot.abort(self.generation);
        }
    }
}

struct Slot {
    state: ConnectionState,
    generation: u64,
    active: Option<ActiveConnection>,
    pending: Option<CancellationToken>,
}

pub(crate) struct LinkSlot {
    inner: Mutex<Slot>,
}

impl LinkSlot {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Slot {
                state: ConnectionState::Idle,
                generation: 0,
                active: None,
                pending: None,
            }),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Claim the slot for a new attempt, or fail with `Busy` leaving it as is.
    pub(crate) fn begin(self: &Arc<Self>, next: ConnectionState) -> Result<Attempt> {
        debug_assert!(matches!(
            next,
            ConnectionState::Connecting | ConnectionState::Listening
        ));

        let mut slot = self.inner.lock();
        if slot.state.is_occupied() {
            return Err(LinkError::Busy);
        }

        slot.generation += 1;
        slot.state = next;
        let cancel = CancellationToken::new();
        slot.pending = Some(cancel.clone());
        debug!("Slot claimed: {} (generation {})", next, slot.generation);

        Ok(Attempt {
            slot: self.clone(),
            generation: slot.generation,
            cancel,
            installed: false,
        })
    }

    /// Give the slot back after a failed attempt.
    fn abort(&self, generation: u64) {
        let mut slot = self.inner.lock();
        if slot.generation == generation && slot.active.is_none() {
            slot.state = ConnectionState::Idle;
            slot.pending = None;
            debug!("Slot returned to idle (generation {})", generation);
        }
    }

    /// Install the connection produced by a successful attempt.
    pub(crate) fn install(&self, mut attempt: Attempt, connection: ActiveConnection) {
        attempt.installed = true;
        let mut slot = self.inner.lock();
        debug_assert_eq!(slot.generation, attempt.generation);
        debug_assert!(slot.active.is_none());

        slot.state = ConnectionState::Connected;
        slot.active = Some(connection);
        slot.pending = None;
    }

    /// Clear the slot if `generation` still owns it.
    pub(crate) fn release(&self, generation: u64) -> bool {
        let mut slot = self.inner.lock();
        if slot.generation != generation || slot.active.is_none() {
            return false;
        }

        slot.active = None;
        slot.state = ConnectionState::Lost;
        debug!("Slot released (generation {})", generation);
        true
    }

    pub(crate) fn active(&self) -> Option<ActiveConnection> {
        self.inner.lock().active.clone()
    }

    /// Whether `generation` is the installed, connected session.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        let slot = self.inner.lock();
        slot.state == ConnectionState::Connected && slot.generation == generation
    }

    /// Cancel the in-flight attempt, if any.
    pub(crate) fn cancel_pending(&self) -> bool {
        let pending = self.inner.lock().pending.take();
        match pending {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> Arc<LinkSlot> {
        Arc::new(LinkSlot::new())
    }

    #[test]
    fn test_begin_rejects_while_occupied() {
        let slot = slot();
        let attempt = slot.begin(ConnectionState::Connecting).unwrap();
        assert_eq!(attempt.generation, 1);
        assert_eq!(slot.state(), ConnectionState::Connecting);

        let second = slot.begin(ConnectionState::Listening);
        assert!(matches!(second, Err(LinkError::Busy)));
        assert_eq!(slot.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_dropped_attempt_returns_to_idle() {
        let slot = slot();
        let attempt = slot.begin(ConnectionState::Listening).unwrap();
        drop(attempt);
        assert_eq!(slot.state(), ConnectionState::Idle);
        assert!(slot.begin(ConnectionState::Connecting).is_ok());
    }

    #[test]
    fn test_stale_abort_is_ignored() {
        let slot = slot();
        let first = slot.begin(ConnectionState::Connecting).unwrap();
        let stale = first.generation;
        drop(first);
        let _second = slot.begin(ConnectionState::Connecting).unwrap();

        slot.abort(stale);
        assert_eq!(slot.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_cancel_pending_fires_token_once() {
        let slot = slot();
        let attempt = slot.begin(ConnectionState::Listening).unwrap();

        assert!(slot.cancel_pending());
        assert!(attempt.cancel.is_cancelled());
        assert!(!slot.cancel_pending());
    }

    #[test]
    fn test_release_without_connection_is_noop() {
        let slot = slot();
        let attempt = slot.begin(ConnectionState::Connecting).unwrap();
        assert!(!slot.release(attempt.generation));
        assert_eq!(slot.state(), ConnectionState::Connecting);
        assert!(!slot.is_current(attempt.generation));
    }
}
