//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production, stderr on the host).
//! Every event is one line with a fixed tag so a serial capture can be
//! grepped.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink {
    emitted: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events written so far.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        self.emitted = self.emitted.wrapping_add(1);
        match event {
            AppEvent::Started { role, state } => {
                info!("START | role={:?} relay={}", role, state);
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from, to);
            }
            AppEvent::MirrorOverride { local, remote } => {
                info!("MIRROR | master={} overrides local={}", remote, local);
            }
            AppEvent::MirrorLost(e) => {
                warn!("MIRROR | lost: {} (holding last state)", e);
            }
            AppEvent::MirrorRestored {
                failed_polls,
                remote,
            } => {
                info!(
                    "MIRROR | restored after {} failed polls, master={}",
                    failed_polls, remote
                );
            }
            AppEvent::SleepExpired => {
                info!("SLEEP | expired, relay forced OFF");
            }
        }
    }
}
