//! Relay state and the shared state store.
//!
//! [`StateStore`] is the single source of truth for what the relay should be
//! doing. Request handlers, the remote mirror and the sleep timer's worker
//! thread all write it; the control loop reads it once per cycle. The value
//! lives in one atomic byte, so a reader never observes a partial write
//! regardless of which thread wrote it.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Logical relay position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelayState {
    On,
    Off,
}

impl RelayState {
    /// Wire token served by `/getStatus` and embedded in `/relay` replies.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }

    /// Interpret a status body from another node.
    ///
    /// Only the exact token `ON` (surrounding whitespace ignored) means on;
    /// every other body, including an empty one, means off.
    pub fn from_status_text(text: &str) -> Self {
        if text.trim_ascii() == "ON" {
            Self::On
        } else {
            Self::Off
        }
    }

    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }

    const fn to_u8(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::On => 1,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        if raw == 0 { Self::Off } else { Self::On }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared, lock-free relay state cell.
///
/// Starts at [`RelayState::Off`]; nothing is persisted, so a restart always
/// comes back off.
#[derive(Debug)]
pub struct StateStore {
    raw: AtomicU8,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub const fn new() -> Self {
        Self {
            raw: AtomicU8::new(RelayState::Off.to_u8()),
        }
    }

    pub fn get(&self) -> RelayState {
        RelayState::from_u8(self.raw.load(Ordering::Acquire))
    }

    pub fn set(&self, state: RelayState) {
        self.raw.store(state.to_u8(), Ordering::Release);
    }

    /// Store `state` and return the value it replaced.
    pub fn replace(&self, state: RelayState) -> RelayState {
        RelayState::from_u8(self.raw.swap(state.to_u8(), Ordering::AcqRel))
    }
}
