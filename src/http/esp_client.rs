//! Master status poller on the ESP-IDF HTTP client.
//!
//! Wraps `esp_http_client` through `EspHttpConnection` and the
//! `embedded_svc` blocking [`Client`]. Each network operation inside the
//! IDF client is bounded by the configured timeout, and the exchange as a
//! whole is checked against one deadline between reads, so a Master that
//! trickles its answer costs at most two timeouts.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use embedded_svc::http::Status;
use embedded_svc::http::client::Client;
use embedded_svc::io::Read;
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
use esp_idf_svc::io::EspIOError;
use log::trace;

use crate::app::endpoints::ROUTE_STATUS;
use crate::app::ports::StatusClient;
use crate::app::state::RelayState;
use crate::error::MirrorError;
use crate::http::client::MAX_RESPONSE_LEN;

pub struct EspStatusClient {
    url: String,
    timeout: Duration,
}

impl EspStatusClient {
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        Self {
            url: format!("http://{}{}", addr, ROUTE_STATUS),
            timeout,
        }
    }

    /// Status code and body of one `GET /getStatus`.
    fn exchange(&self) -> Result<(u16, Vec<u8>), MirrorError> {
        let deadline = Instant::now() + self.timeout;
        // Past the deadline any failure counts as a timeout.
        let fail = |_: EspIOError| {
            if Instant::now() >= deadline {
                MirrorError::Timeout
            } else {
                MirrorError::Unreachable
            }
        };

        let conn = EspHttpConnection::new(&Configuration {
            timeout: Some(self.timeout),
            ..Default::default()
        })
        .map_err(|e| fail(e.into()))?;
        let mut client = Client::wrap(conn);
        let mut response = client
            .get(&self.url)
            .map_err(fail)?
            .submit()
            .map_err(fail)?;
        let status = response.status();

        let mut body = Vec::with_capacity(16);
        let mut chunk = [0u8; 64];
        loop {
            if Instant::now() >= deadline {
                return Err(MirrorError::Timeout);
            }
            let n = response.read(&mut chunk).map_err(fail)?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
            if body.len() > MAX_RESPONSE_LEN {
                return Err(MirrorError::Malformed);
            }
        }
        Ok((status, body))
    }
}

impl StatusClient for EspStatusClient {
    fn fetch_status(&mut self) -> Result<RelayState, MirrorError> {
        let (status, body) = self.exchange()?;
        if status != 200 {
            return Err(MirrorError::Status(status));
        }
        let body = core::str::from_utf8(&body).map_err(|_| MirrorError::Malformed)?;
        trace!("Mirror: master says {:?}", body);
        Ok(RelayState::from_status_text(body))
    }
}
