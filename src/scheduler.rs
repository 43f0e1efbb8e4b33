//! Deferred auto-off ("sleep") timer.
//!
//! A single-slot, re-armable one-shot timer. When it fires it forces the
//! shared [`StateStore`] to [`RelayState::Off`] and nothing else.
//!
//! ```text
//!  /sleep?time=N ──▶ arm(N) ──▶ ┌────────────┐  deadline  ┌────────────────┐
//!                               │ TimerSlot  │ ─────────▶ │ store.set(OFF) │
//!  re-arm ─────────▶ replace ──▶│ (1 entry)  │            └────────────────┘
//!                               └────────────┘
//!                                worker thread waits on a Condvar
//! ```
//!
//! The scheduling logic lives in [`TimerSlot`], a pure state machine driven
//! by explicit `Instant`s, so replacement and expiry races are testable
//! without sleeping. [`DeferredOffTimer`] wraps it with a worker thread that
//! sleeps until the current deadline and is woken early whenever the slot
//! is re-armed or cancelled.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::app::state::{RelayState, StateStore};
use crate::drivers::task_pin::{self, Core};

// ═══════════════════════════════════════════════════════════════
//  Slot state machine
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Idle,
    Armed { deadline: Instant },
}

/// Result of polling the slot at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPoll {
    /// Nothing scheduled.
    Idle,
    /// Armed; the deadline is this far away.
    Pending(Duration),
    /// The armed entry with this generation reached its deadline and the
    /// slot is idle again.
    Fired(u64),
}

/// Single pending expiry plus a generation counter.
///
/// Every `arm` bumps the generation, which acts as the cancellation token
/// for whatever was scheduled before.
#[derive(Debug, Clone)]
pub struct TimerSlot {
    state: SlotState,
    generation: u64,
}

impl Default for TimerSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerSlot {
    pub const fn new() -> Self {
        Self {
            state: SlotState::Idle,
            generation: 0,
        }
    }

    /// Schedule an expiry `after` from `now`, replacing any pending one.
    /// Returns the generation of the new entry.
    pub fn arm(&mut self, now: Instant, after: Duration) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.state = SlotState::Armed {
            deadline: now + after,
        };
        self.generation
    }

    /// Drop the pending expiry. Returns `true` if one was pending.
    pub fn cancel(&mut self) -> bool {
        let was_armed = self.is_armed();
        if was_armed {
            self.generation = self.generation.wrapping_add(1);
        }
        self.state = SlotState::Idle;
        was_armed
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, SlotState::Armed { .. })
    }

    /// Advance to `now`: fire (and disarm) if the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> SlotPoll {
        match self.state {
            SlotState::Idle => SlotPoll::Idle,
            SlotState::Armed { deadline } if now >= deadline => {
                self.state = SlotState::Idle;
                SlotPoll::Fired(self.generation)
            }
            SlotState::Armed { deadline } => SlotPoll::Pending(deadline - now),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Threaded timer
// ═══════════════════════════════════════════════════════════════

struct Shared {
    slot: Mutex<Worker>,
    wake: Condvar,
    expiries: AtomicU32,
}

struct Worker {
    slot: TimerSlot,
    shutdown: bool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Worker> {
        // Guarded data is plain values, consistent even after a poisoning panic.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Re-armable one-shot timer that switches the relay off when it fires.
///
/// Owns a worker thread for its whole lifetime; dropping the timer stops
/// and joins the worker. A pending expiry is discarded on drop.
pub struct DeferredOffTimer {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

/// Stack for the timer worker; it waits on a condvar, stores a byte and logs.
const WORKER_STACK_KB: usize = 16;
const WORKER_PRIORITY: u8 = 5;

impl DeferredOffTimer {
    /// Spawn the worker. `store` is the state the expiry writes to.
    pub fn start(store: Arc<StateStore>) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Worker {
                slot: TimerSlot::new(),
                shutdown: false,
            }),
            wake: Condvar::new(),
            expiries: AtomicU32::new(0),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = task_pin::spawn_on_core(
            Core::App,
            WORKER_PRIORITY,
            WORKER_STACK_KB,
            "sleep-timer\0",
            move || run_worker(&worker_shared, &store),
        )?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Schedule the relay to switch off after `after`, replacing any
    /// pending expiry.
    pub fn arm(&self, after: Duration) {
        let generation = self.shared.lock().slot.arm(Instant::now(), after);
        self.shared.wake.notify_one();
        debug!("Sleep: armed for {} ms (gen {})", after.as_millis(), generation);
    }

    /// Drop the pending expiry, if any. Returns `true` if one was pending.
    pub fn cancel(&self) -> bool {
        let cancelled = self.shared.lock().slot.cancel();
        self.shared.wake.notify_one();
        if cancelled {
            debug!("Sleep: cancelled");
        }
        cancelled
    }

    pub fn is_armed(&self) -> bool {
        self.shared.lock().slot.is_armed()
    }

    /// Total number of expiries since the timer was started.
    pub fn expiry_count(&self) -> u32 {
        self.shared.expiries.load(Ordering::Acquire)
    }
}

impl Drop for DeferredOffTimer {
    fn drop(&mut self) {
        self.shared.lock().shutdown = true;
        self.shared.wake.notify_one();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker(shared: &Shared, store: &StateStore) {
    let mut guard = shared.lock();
    loop {
        if guard.shutdown {
            debug!("Sleep: worker exiting");
            return;
        }
        match guard.slot.poll(Instant::now()) {
            SlotPoll::Fired(generation) => {
                store.set(RelayState::Off);
                shared.expiries.fetch_add(1, Ordering::AcqRel);
                info!("Sleep: expired (gen {}), relay forced off", generation);
            }
            SlotPoll::Pending(remaining) => {
                guard = shared
                    .wake
                    .wait_timeout(guard, remaining)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
            SlotPoll::Idle => {
                guard = shared
                    .wake
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
