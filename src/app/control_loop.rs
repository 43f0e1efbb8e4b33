//! The control loop: one cycle = serve requests, sync role, commit relay.
//!
//! ```text
//!  RequestPort ──▶ ┌──────────────────────────────┐ ──▶ RelayPort
//!                  │          ControlLoop          │
//!  StatusClient ──▶│ Endpoints · SyncRole · Timer  │ ──▶ EventSink
//!                  └──────────────────────────────┘
//! ```
//!
//! The order inside a cycle is fixed: every request answered this cycle is
//! applied before the role sync, so on a Slave a successful poll always has
//! the last word. Only this loop writes the relay output.

use log::info;

use crate::app::endpoints::Endpoints;
use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, RelayPort, RequestPort};
use crate::app::role::{SyncOutcome, SyncRole};
use crate::app::state::{RelayState, StateStore};
use crate::config::NodeRole;

/// What happened during one [`ControlLoop::cycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Requests answered this cycle.
    pub requests: usize,
    pub sync: SyncOutcome,
    /// State written to the relay at the end of the cycle.
    pub committed: RelayState,
}

pub struct ControlLoop {
    endpoints: Endpoints,
    role: Box<dyn SyncRole>,
    max_requests: usize,
    cycle_count: u64,
    /// Consecutive failed polls; non-zero means the mirror is currently lost.
    failed_polls: u32,
    seen_expiries: u32,
}

impl ControlLoop {
    pub fn new(endpoints: Endpoints, role: Box<dyn SyncRole>, max_requests: usize) -> Self {
        let seen_expiries = endpoints.timer().expiry_count();
        Self {
            endpoints,
            role,
            max_requests: max_requests.max(1),
            cycle_count: 0,
            failed_polls: 0,
            seen_expiries,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Commit the current state and announce the node.
    pub fn start(&mut self, relay: &mut impl RelayPort, sink: &mut impl EventSink) {
        let state = self.store().get();
        relay.commit(state);
        let role = self.role.role();
        sink.emit(&AppEvent::Started { role, state });
        info!("ControlLoop started as {:?}, relay {}", role, state);
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one full cycle: requests → role sync → relay commit.
    pub fn cycle(
        &mut self,
        requests: &mut impl RequestPort,
        relay: &mut impl RelayPort,
        sink: &mut impl EventSink,
    ) -> CycleReport {
        self.cycle_count += 1;

        // 1. Serve pending requests, one at a time
        let endpoints = &self.endpoints;
        let served = requests.serve_pending(self.max_requests, &mut |req| endpoints.dispatch(req));

        // 2. Role-specific sync
        let sync = self.role.sync(self.endpoints.store());
        self.report_sync(sync, sink);

        // 3. Timer expiries since the last cycle
        let expiries = self.endpoints.timer().expiry_count();
        if expiries != self.seen_expiries {
            self.seen_expiries = expiries;
            sink.emit(&AppEvent::SleepExpired);
        }

        // 4. Commit
        let state = self.store().get();
        let previous = relay.committed();
        relay.commit(state);
        if let Some(from) = previous.filter(|&from| from != state) {
            sink.emit(&AppEvent::StateChanged { from, to: state });
        }

        CycleReport {
            requests: served,
            sync,
            committed: state,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn store(&self) -> &StateStore {
        self.endpoints.store()
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn role(&self) -> NodeRole {
        self.role.role()
    }

    /// Total cycles executed since construction.
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Whether the last poll of the Master failed (always `false` on a Master).
    pub fn is_mirror_lost(&self) -> bool {
        self.failed_polls > 0
    }

    // ── Internal ──────────────────────────────────────────────

    fn report_sync(&mut self, sync: SyncOutcome, sink: &mut impl EventSink) {
        match sync {
            SyncOutcome::Skipped => {}
            SyncOutcome::Mirrored { remote, previous } => {
                if self.failed_polls > 0 {
                    sink.emit(&AppEvent::MirrorRestored {
                        failed_polls: self.failed_polls,
                        remote,
                    });
                    self.failed_polls = 0;
                }
                if previous != remote {
                    sink.emit(&AppEvent::MirrorOverride {
                        local: previous,
                        remote,
                    });
                }
            }
            SyncOutcome::Failed(e) => {
                if self.failed_polls == 0 {
                    sink.emit(&AppEvent::MirrorLost(e));
                }
                self.failed_polls = self.failed_polls.saturating_add(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::role::{MasterRole, RemoteMirror};
    use crate::app::ports::StatusClient;
    use crate::config::CommandPolicy;
    use crate::error::MirrorError;
    use crate::http::codec::{Request, Response};
    use crate::scheduler::DeferredOffTimer;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    #[derive(Default)]
    struct Relay(Vec<RelayState>);

    impl RelayPort for Relay {
        fn commit(&mut self, state: RelayState) {
            self.0.push(state);
        }
        fn committed(&self) -> Option<RelayState> {
            self.0.last().copied()
        }
    }

    #[derive(Default)]
    struct Queue(Vec<Request>);

    impl RequestPort for Queue {
        fn serve_pending(
            &mut self,
            max: usize,
            handler: &mut dyn FnMut(&Request) -> Response,
        ) -> usize {
            let n = max.min(self.0.len());
            for req in self.0.drain(..n) {
                handler(&req);
            }
            n
        }
    }

    #[derive(Default)]
    struct Events(Vec<AppEvent>);

    impl EventSink for Events {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    struct Fixed(Result<RelayState, MirrorError>);

    impl StatusClient for Fixed {
        fn fetch_status(&mut self) -> Result<RelayState, MirrorError> {
            self.0
        }
    }

    fn control_loop(role: Box<dyn SyncRole>) -> ControlLoop {
        let store = Arc::new(StateStore::new());
        let timer = DeferredOffTimer::start(store.clone()).unwrap();
        let ep = Endpoints::new(
            store,
            timer,
            Ipv4Addr::LOCALHOST,
            CommandPolicy::Permissive,
        );
        ControlLoop::new(ep, role, 4)
    }

    #[test]
    fn master_applies_command_in_same_cycle() {
        let mut cl = control_loop(Box::new(MasterRole));
        let (mut relay, mut events) = (Relay::default(), Events::default());
        cl.start(&mut relay, &mut events);

        let mut q = Queue(vec![Request::get("/relay", &[("do", "on")])]);
        let report = cl.cycle(&mut q, &mut relay, &mut events);
        assert_eq!(report.requests, 1);
        assert_eq!(report.sync, SyncOutcome::Skipped);
        assert_eq!(report.committed, RelayState::On);
        assert_eq!(
            events.0,
            vec![
                AppEvent::Started {
                    role: NodeRole::Master,
                    state: RelayState::Off
                },
                AppEvent::StateChanged {
                    from: RelayState::Off,
                    to: RelayState::On
                },
            ]
        );
    }

    #[test]
    fn request_budget_is_respected() {
        let mut cl = control_loop(Box::new(MasterRole));
        let (mut relay, mut events) = (Relay::default(), Events::default());
        let mut q = Queue(vec![Request::get("/getStatus", &[]); 6]);
        assert_eq!(cl.cycle(&mut q, &mut relay, &mut events).requests, 4);
        assert_eq!(cl.cycle(&mut q, &mut relay, &mut events).requests, 2);
        assert_eq!(cl.cycle_count(), 2);
    }

    #[test]
    fn mirror_wins_over_local_command() {
        let mut cl = control_loop(Box::new(RemoteMirror::new(Fixed(Ok(RelayState::Off)))));
        let (mut relay, mut events) = (Relay::default(), Events::default());
        let mut q = Queue(vec![Request::get("/relay", &[("do", "on")])]);
        let report = cl.cycle(&mut q, &mut relay, &mut events);
        assert_eq!(report.committed, RelayState::Off);
        assert_eq!(
            events.0,
            vec![AppEvent::MirrorOverride {
                local: RelayState::On,
                remote: RelayState::Off
            }]
        );
    }

    #[test]
    fn lost_mirror_reported_once() {
        let mut cl = control_loop(Box::new(RemoteMirror::new(Fixed(Err(
            MirrorError::Timeout,
        )))));
        let (mut relay, mut events) = (Relay::default(), Events::default());
        for _ in 0..5 {
            cl.cycle(&mut Queue::default(), &mut relay, &mut events);
        }
        assert!(cl.is_mirror_lost());
        assert_eq!(events.0, vec![AppEvent::MirrorLost(MirrorError::Timeout)]);
    }
}
