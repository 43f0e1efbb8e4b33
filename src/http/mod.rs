//! HTTP/1.x plumbing for the relay API.
//!
//! - [`codec`]: request/response parsing and encoding (pure, host-testable)
//! - [`transport`]: inbound listener implementing [`RequestPort`](crate::app::ports::RequestPort)
//! - [`client`]: plain-socket status poller implementing [`StatusClient`](crate::app::ports::StatusClient)
//! - `esp_client` (ESP-IDF only): the same poller over `EspHttpConnection`

use std::time::{Duration, Instant};

pub mod client;
pub mod codec;
#[cfg(target_os = "espidf")]
pub mod esp_client;
pub mod transport;

pub use client::HttpStatusClient;
pub use codec::{Request, Response};
#[cfg(target_os = "espidf")]
pub use esp_client::EspStatusClient;
pub use transport::HttpListener;

/// Time left until `deadline`, or `None` once it has passed.
pub(crate) fn time_left(deadline: Instant) -> Option<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|left| !left.is_zero())
}
