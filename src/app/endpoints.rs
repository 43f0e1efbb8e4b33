//! The three API routes and their dispatch.
//!
//! ```text
//!   /relay?do=on      ──▶ StateStore.set(ON|OFF)  ──▶ {"status":"ON","IP":"…"}
//!   /getStatus        ──▶ StateStore.get()        ──▶ ON | OFF
//!   /sleep?time=<ms>  ──▶ DeferredOffTimer.arm()  ──▶ 1 | 0
//!   anything else                                 ──▶ 404 Not Found
//! ```
//!
//! Handlers only touch the [`StateStore`] and the [`DeferredOffTimer`];
//! the relay pin is written later in the cycle by the control loop.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error};
use serde::Serialize;

use crate::app::state::{RelayState, StateStore};
use crate::config::CommandPolicy;
use crate::http::codec::{Request, Response};
use crate::scheduler::DeferredOffTimer;

pub const ROUTE_RELAY: &str = "/relay";
pub const ROUTE_STATUS: &str = "/getStatus";
pub const ROUTE_SLEEP: &str = "/sleep";

/// Longest accepted sleep, in milliseconds.
pub const MAX_SLEEP_MS: u64 = u32::MAX as u64;

#[derive(Serialize)]
struct CommandReply {
    status: RelayState,
    #[serde(rename = "IP")]
    ip: Ipv4Addr,
}

#[derive(Serialize)]
struct CommandRejected {
    error: &'static str,
    #[serde(rename = "IP")]
    ip: Ipv4Addr,
}

/// Request handlers bound to one node's state and timer.
pub struct Endpoints {
    store: Arc<StateStore>,
    timer: DeferredOffTimer,
    local_ip: Ipv4Addr,
    policy: CommandPolicy,
}

impl Endpoints {
    pub fn new(
        store: Arc<StateStore>,
        timer: DeferredOffTimer,
        local_ip: Ipv4Addr,
        policy: CommandPolicy,
    ) -> Self {
        Self {
            store,
            timer,
            local_ip,
            policy,
        }
    }

    /// Route `req` by path. Method and body are not inspected.
    pub fn dispatch(&self, req: &Request) -> Response {
        let response = match req.path.as_str() {
            ROUTE_RELAY => self.command(req.arg("do")),
            ROUTE_STATUS => self.status(),
            ROUTE_SLEEP => self.sleep(req.arg("time")),
            _ => Response::not_found(),
        };
        debug!("HTTP: {} -> {}", req.path, response.status);
        response
    }

    /// `/relay`: set the state from the `do` parameter.
    pub fn command(&self, action: Option<&str>) -> Response {
        let state = match (self.policy, action) {
            (_, Some("on")) => RelayState::On,
            (CommandPolicy::Permissive, _) | (CommandPolicy::Strict, Some("off")) => {
                RelayState::Off
            }
            (CommandPolicy::Strict, _) => {
                return json_response(
                    400,
                    &CommandRejected {
                        error: "invalid command",
                        ip: self.local_ip,
                    },
                );
            }
        };
        self.store.set(state);
        json_response(
            200,
            &CommandReply {
                status: state,
                ip: self.local_ip,
            },
        )
    }

    /// `/getStatus`: the current state as bare text.
    pub fn status(&self) -> Response {
        Response::text(200, self.store.get().as_str())
    }

    /// `/sleep`: arm (or re-arm) the deferred-off timer.
    pub fn sleep(&self, time: Option<&str>) -> Response {
        match time.and_then(parse_sleep_duration) {
            Some(after) => {
                self.timer.arm(after);
                Response::text(200, "1")
            }
            None => Response::text(200, "0"),
        }
    }

    pub fn timer(&self) -> &DeferredOffTimer {
        &self.timer
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }
}

/// Parse a `time` value in milliseconds.
///
/// Accepts an unsigned integer or a finite non-negative decimal (the
/// fraction is dropped). Rejects empty, negative, non-numeric and
/// out-of-range values.
pub fn parse_sleep_duration(raw: &str) -> Option<Duration> {
    let ms = match raw.parse::<u64>() {
        Ok(ms) => ms,
        Err(_) => {
            let f = raw.parse::<f64>().ok().filter(|f| f.is_finite() && *f >= 0.0)?;
            if f > MAX_SLEEP_MS as f64 {
                return None;
            }
            f.trunc() as u64
        }
    };
    (ms <= MAX_SLEEP_MS).then(|| Duration::from_millis(ms))
}

fn json_response<T: Serialize>(status: u16, body: &T) -> Response {
    match serde_json::to_string(body) {
        Ok(json) => Response::json(status, json),
        Err(e) => {
            error!("HTTP: reply serialisation failed: {}", e);
            Response::text(500, "Internal Server Error")
        }
    }
}
