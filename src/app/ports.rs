//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ControlLoop (domain)
//! ```
//!
//! Driven adapters (relay pin, HTTP listener, Master client, event sinks,
//! config storage) implement these traits. The
//! [`ControlLoop`](super::control_loop::ControlLoop) consumes them via
//! generics, so the reconciliation logic never touches sockets or GPIO
//! directly and can be exercised with mocks.

use crate::app::state::RelayState;
use crate::config::SystemConfig;
use crate::error::MirrorError;
use crate::http::codec::{Request, Response};

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the physical relay output.
///
/// Only the control loop holds this; nothing else may drive the pin.
pub trait RelayPort {
    /// Drive the output to `state`. Idempotent; never fails from the
    /// caller's point of view.
    fn commit(&mut self, state: RelayState);

    /// Last state committed, `None` before the first commit.
    fn committed(&self) -> Option<RelayState>;
}

// ───────────────────────────────────────────────────────────────
// Remote status port (driven adapter: domain → Master node)
// ───────────────────────────────────────────────────────────────

/// Fetches the Master's current relay state.
///
/// Implementations MUST bound every call with a timeout so a dead Master
/// cannot stall the control loop.
pub trait StatusClient {
    fn fetch_status(&mut self) -> Result<RelayState, MirrorError>;
}

// ───────────────────────────────────────────────────────────────
// Request port (driving adapter: network → domain)
// ───────────────────────────────────────────────────────────────

/// Source of inbound API requests.
///
/// Requests are handed to `handler` strictly one at a time; each one is
/// answered before the next is read.
pub trait RequestPort {
    /// Service up to `max` waiting requests. Returns how many were handled.
    fn serve_pending(&mut self, max: usize, handler: &mut dyn FnMut(&Request) -> Response)
    -> usize;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate values before persisting and reject
/// invalid ranges with [`ConfigError::ValidationFailed`] rather than
/// clamping them.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
