//! Outbound application events.
//!
//! The [`ControlLoop`](super::control_loop::ControlLoop) emits these through
//! the [`EventSink`](super::ports::EventSink) port. Adapters on the other
//! side decide what to do with them.

use crate::app::state::RelayState;
use crate::config::NodeRole;
use crate::error::MirrorError;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The control loop has started (carries role and initial state).
    Started { role: NodeRole, state: RelayState },

    /// The committed relay output changed.
    StateChanged { from: RelayState, to: RelayState },

    /// A successful poll overwrote a local state that differed from the Master.
    MirrorOverride { local: RelayState, remote: RelayState },

    /// The first poll failure after a healthy period.
    MirrorLost(MirrorError),

    /// Polling succeeded again after `failed_polls` consecutive failures.
    MirrorRestored { failed_polls: u32, remote: RelayState },

    /// The sleep timer fired and forced the relay off.
    SleepExpired,
}
