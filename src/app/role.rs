//! Per-cycle synchronisation strategy.
//!
//! The node's role is chosen once at boot and expressed as a [`SyncRole`]
//! object, so the control loop never branches on [`NodeRole`] itself.
//!
//! ```text
//!   MasterRole    sync() ──▶ Skipped
//!   RemoteMirror  sync() ──▶ GET /getStatus ──▶ StateStore.set(remote)  (Mirrored)
//!                                         ╰──▶ no change              (Failed)
//! ```

use log::debug;

use crate::app::ports::StatusClient;
use crate::app::state::{RelayState, StateStore};
use crate::config::NodeRole;
use crate::error::MirrorError;

/// Result of one [`SyncRole::sync`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing to synchronise (Master).
    Skipped,
    /// The remote state was written to the store. `previous` is what the
    /// store held just before.
    Mirrored {
        remote: RelayState,
        previous: RelayState,
    },
    /// The poll failed; the store was not touched.
    Failed(MirrorError),
}

/// Role-specific step run once per control cycle, after requests are served.
pub trait SyncRole {
    fn role(&self) -> NodeRole;

    fn sync(&mut self, store: &StateStore) -> SyncOutcome;
}

/// The authoritative node: local state is never overridden.
#[derive(Debug, Default, Clone, Copy)]
pub struct MasterRole;

impl SyncRole for MasterRole {
    fn role(&self) -> NodeRole {
        NodeRole::Master
    }

    fn sync(&mut self, _store: &StateStore) -> SyncOutcome {
        SyncOutcome::Skipped
    }
}

/// Slave strategy: copy the Master's state into the local store.
///
/// A failed poll leaves the store as it was (fail-open). The consecutive
/// failure count is kept so callers can report loss and recovery once
/// instead of every cycle.
pub struct RemoteMirror<C> {
    client: C,
    failure_streak: u32,
}

impl<C: StatusClient> RemoteMirror<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            failure_streak: 0,
        }
    }
}

impl<C: StatusClient> SyncRole for RemoteMirror<C> {
    fn role(&self) -> NodeRole {
        NodeRole::Slave
    }

    fn sync(&mut self, store: &StateStore) -> SyncOutcome {
        match self.client.fetch_status() {
            Ok(remote) => {
                let previous = store.replace(remote);
                self.failure_streak = 0;
                SyncOutcome::Mirrored { remote, previous }
            }
            Err(e) => {
                self.failure_streak = self.failure_streak.saturating_add(1);
                debug!("Mirror: poll failed ({}), streak {}", e, self.failure_streak);
                SyncOutcome::Failed(e)
            }
        }
    }
}
