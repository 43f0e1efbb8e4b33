//! Integration tests: requests → role sync → relay commit.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use netrelay::app::control_loop::ControlLoop;
use netrelay::app::endpoints::Endpoints;
use netrelay::app::events::AppEvent;
use netrelay::app::role::{MasterRole, RemoteMirror, SyncOutcome, SyncRole};
use netrelay::app::state::{RelayState, StateStore};
use netrelay::config::{CommandPolicy, NodeRole};
use netrelay::error::MirrorError;
use netrelay::scheduler::DeferredOffTimer;

use crate::mock_hw::{MockRelay, QueuedRequests, RecordingSink, ScriptedMaster};

const IP: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 100);

struct Rig {
    control: ControlLoop,
    requests: QueuedRequests,
    relay: MockRelay,
    sink: RecordingSink,
}

impl Rig {
    fn new(role: Box<dyn SyncRole>) -> Self {
        let store = Arc::new(StateStore::new());
        let timer = DeferredOffTimer::start(Arc::clone(&store)).unwrap();
        let endpoints = Endpoints::new(store, timer, IP, CommandPolicy::Permissive);
        let mut rig = Self {
            control: ControlLoop::new(endpoints, role, 4),
            requests: QueuedRequests::new(),
            relay: MockRelay::new(),
            sink: RecordingSink::new(),
        };
        rig.control.start(&mut rig.relay, &mut rig.sink);
        rig
    }

    fn master() -> Self {
        Self::new(Box::new(MasterRole))
    }

    fn slave(master: ScriptedMaster) -> Self {
        Self::new(Box::new(RemoteMirror::new(master)))
    }

    fn cycle(&mut self) -> netrelay::app::control_loop::CycleReport {
        self.control
            .cycle(&mut self.requests, &mut self.relay, &mut self.sink)
    }
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn start_commits_off_and_announces_role() {
    let rig = Rig::slave(ScriptedMaster::steady(RelayState::On));
    assert_eq!(rig.relay.commits, vec![RelayState::Off]);
    assert_eq!(
        rig.sink.events,
        vec![AppEvent::Started {
            role: NodeRole::Slave,
            state: RelayState::Off
        }]
    );
    assert_eq!(rig.control.role(), NodeRole::Slave);
}

// ── Master scenarios ──────────────────────────────────────────

#[test]
fn master_command_on_then_status_on() {
    let mut rig = Rig::master();
    rig.requests.push("/relay", &[("do", "on")]);
    rig.cycle();
    assert!(rig.relay.is_on());

    rig.requests.push("/getStatus", &[]);
    rig.cycle();
    assert_eq!(rig.requests.last_body(), Some("ON"));
}

#[test]
fn master_sleep_turns_relay_off() {
    let mut rig = Rig::master();
    rig.requests
        .push("/relay", &[("do", "on")])
        .push("/sleep", &[("time", "50")]);
    rig.cycle();
    assert!(rig.relay.is_on());
    assert_eq!(rig.requests.last_body(), Some("1"));

    thread::sleep(Duration::from_millis(100));
    rig.requests.push("/getStatus", &[]);
    let report = rig.cycle();
    assert_eq!(rig.requests.last_body(), Some("OFF"));
    assert_eq!(report.committed, RelayState::Off);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::SleepExpired), 1);
    assert!(rig.sink.events.contains(&AppEvent::StateChanged {
        from: RelayState::On,
        to: RelayState::Off
    }));
}

#[test]
fn rearming_sleep_fires_once_at_the_shorter_deadline() {
    let mut rig = Rig::master();
    rig.requests
        .push("/relay", &[("do", "on")])
        .push("/sleep", &[("time", "400")])
        .push("/sleep", &[("time", "40")]);
    rig.cycle();

    thread::sleep(Duration::from_millis(120));
    rig.cycle();
    assert!(!rig.relay.is_on());

    // Turn back on; the replaced 400 ms expiry must not fire later.
    rig.requests.push("/relay", &[("do", "on")]);
    rig.cycle();
    thread::sleep(Duration::from_millis(450));
    rig.cycle();
    assert!(rig.relay.is_on());
    assert_eq!(rig.control.endpoints().timer().expiry_count(), 1);
}

#[test]
fn relay_command_does_not_cancel_pending_sleep() {
    let mut rig = Rig::master();
    rig.requests
        .push("/sleep", &[("time", "60")])
        .push("/relay", &[("do", "on")]);
    rig.cycle();
    assert!(rig.relay.is_on());

    thread::sleep(Duration::from_millis(150));
    rig.cycle();
    assert!(!rig.relay.is_on());
}

#[test]
fn sleep_without_time_changes_nothing() {
    let mut rig = Rig::master();
    rig.requests.push("/relay", &[("do", "on")]).push("/sleep", &[]);
    rig.cycle();
    assert_eq!(rig.requests.last_body(), Some("0"));
    assert!(!rig.control.endpoints().timer().is_armed());
    assert!(rig.relay.is_on());
}

#[test]
fn requests_beyond_budget_wait_for_next_cycle() {
    let mut rig = Rig::master();
    for _ in 0..5 {
        rig.requests.push("/getStatus", &[]);
    }
    rig.requests.push("/relay", &[("do", "on")]);
    assert_eq!(rig.cycle().requests, 4);
    assert!(!rig.relay.is_on());
    assert_eq!(rig.cycle().requests, 2);
    assert!(rig.relay.is_on());
    assert_eq!(rig.control.cycle_count(), 2);
}

// ── Slave scenarios ───────────────────────────────────────────

#[test]
fn slave_follows_master_on() {
    let mut rig = Rig::slave(ScriptedMaster::steady(RelayState::On));
    let report = rig.cycle();
    assert_eq!(
        report.sync,
        SyncOutcome::Mirrored {
            remote: RelayState::On,
            previous: RelayState::Off
        }
    );
    assert!(rig.relay.is_on());
    rig.requests.push("/getStatus", &[]);
    rig.cycle();
    assert_eq!(rig.requests.last_body(), Some("ON"));
}

#[test]
fn successful_poll_overrides_local_command() {
    let mut rig = Rig::slave(ScriptedMaster::steady(RelayState::On));
    rig.requests.push("/relay", &[("do", "off")]);
    let report = rig.cycle();
    assert_eq!(report.committed, RelayState::On);
    assert!(rig.sink.events.contains(&AppEvent::MirrorOverride {
        local: RelayState::Off,
        remote: RelayState::On
    }));
}

#[test]
fn unreachable_master_keeps_last_state() {
    let mut rig = Rig::slave(ScriptedMaster::scripted(
        &[Ok(RelayState::On)],
        Err(MirrorError::Unreachable),
    ));
    rig.cycle();
    assert!(rig.relay.is_on());

    for _ in 0..3 {
        let before = rig.control.store().get();
        let report = rig.cycle();
        assert_eq!(report.sync, SyncOutcome::Failed(MirrorError::Unreachable));
        assert_eq!(rig.control.store().get(), before);
    }
    assert!(rig.relay.is_on());
}

#[test]
fn local_command_sticks_while_master_is_down() {
    let mut rig = Rig::slave(ScriptedMaster::down(MirrorError::Timeout));
    rig.requests.push("/relay", &[("do", "on")]);
    rig.cycle();
    assert!(rig.relay.is_on());
}

#[test]
fn mirror_loss_and_recovery_reported_once_each() {
    let mut rig = Rig::slave(ScriptedMaster::scripted(
        &[
            Ok(RelayState::Off),
            Err(MirrorError::Timeout),
            Err(MirrorError::Timeout),
            Err(MirrorError::Status(500)),
        ],
        Ok(RelayState::On),
    ));
    for _ in 0..6 {
        rig.cycle();
    }
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::MirrorLost(_))),
        1
    );
    assert!(rig.sink.events.contains(&AppEvent::MirrorLost(MirrorError::Timeout)));
    assert!(rig.sink.events.contains(&AppEvent::MirrorRestored {
        failed_polls: 3,
        remote: RelayState::On
    }));
    assert!(!rig.control.is_mirror_lost());
}
