//! Mock adapters for integration tests.
//!
//! Each mock records what the control loop did to it so tests can assert
//! on the full history without sockets or GPIO registers.

use netrelay::app::events::AppEvent;
use netrelay::app::ports::{EventSink, RelayPort, RequestPort, StatusClient};
use netrelay::app::state::RelayState;
use netrelay::error::MirrorError;
use netrelay::http::codec::{Request, Response};
use std::collections::VecDeque;

// ── MockRelay ─────────────────────────────────────────────────

/// Records every commit.
#[derive(Default)]
pub struct MockRelay {
    pub commits: Vec<RelayState>,
}

#[allow(dead_code)]
impl MockRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self) -> bool {
        self.committed() == Some(RelayState::On)
    }
}

impl RelayPort for MockRelay {
    fn commit(&mut self, state: RelayState) {
        self.commits.push(state);
    }

    fn committed(&self) -> Option<RelayState> {
        self.commits.last().copied()
    }
}

// ── ScriptedMaster ────────────────────────────────────────────

/// Status client that replays a script, then repeats its fallback.
pub struct ScriptedMaster {
    script: VecDeque<Result<RelayState, MirrorError>>,
    fallback: Result<RelayState, MirrorError>,
    pub polls: u32,
}

#[allow(dead_code)]
impl ScriptedMaster {
    /// Always answers `state`.
    pub fn steady(state: RelayState) -> Self {
        Self::scripted(&[], Ok(state))
    }

    /// Never reachable.
    pub fn down(e: MirrorError) -> Self {
        Self::scripted(&[], Err(e))
    }

    pub fn scripted(
        script: &[Result<RelayState, MirrorError>],
        fallback: Result<RelayState, MirrorError>,
    ) -> Self {
        Self {
            script: script.iter().copied().collect(),
            fallback,
            polls: 0,
        }
    }
}

impl StatusClient for ScriptedMaster {
    fn fetch_status(&mut self) -> Result<RelayState, MirrorError> {
        self.polls += 1;
        self.script.pop_front().unwrap_or(self.fallback)
    }
}

// ── QueuedRequests ────────────────────────────────────────────

/// Request source fed by the test; keeps every response it produced.
#[derive(Default)]
pub struct QueuedRequests {
    pending: VecDeque<Request>,
    pub responses: Vec<Response>,
}

#[allow(dead_code)]
impl QueuedRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: &str, params: &[(&str, &str)]) -> &mut Self {
        self.pending.push_back(Request::get(path, params));
        self
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn last_body(&self) -> Option<&str> {
        self.responses.last().map(|r| r.body.as_str())
    }
}

impl RequestPort for QueuedRequests {
    fn serve_pending(
        &mut self,
        max: usize,
        handler: &mut dyn FnMut(&Request) -> Response,
    ) -> usize {
        let mut served = 0;
        while served < max {
            let Some(req) = self.pending.pop_front() else {
                break;
            };
            self.responses.push(handler(&req));
            served += 1;
        }
        served
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
