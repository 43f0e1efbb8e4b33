//! Outbound status client used by a Slave to poll its Master.
//!
//! One short-lived connection per poll: connect, send
//! `GET /getStatus HTTP/1.1`, read until the peer closes (or the declared
//! `Content-Length` arrives), parse. The whole exchange shares one deadline
//! of the configured mirror timeout; a Master that trickles its answer is
//! cut off like a silent one.
//!
//! This is the plain-socket client used on the host. The firmware polls
//! through [`EspStatusClient`](crate::http::esp_client::EspStatusClient).

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use log::trace;

use crate::app::endpoints::ROUTE_STATUS;
use crate::app::ports::StatusClient;
use crate::app::state::RelayState;
use crate::error::MirrorError;
use crate::http::{codec, time_left};

/// Largest response accepted from the Master.
pub const MAX_RESPONSE_LEN: usize = 1024;

pub struct HttpStatusClient {
    addr: SocketAddr,
    timeout: Duration,
    request: Vec<u8>,
}

impl HttpStatusClient {
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            ROUTE_STATUS,
            addr.ip()
        )
        .into_bytes();
        Self {
            addr,
            timeout,
            request,
        }
    }

    fn exchange(&self) -> Result<Vec<u8>, MirrorError> {
        let deadline = Instant::now() + self.timeout;
        let mut stream =
            TcpStream::connect_timeout(&self.addr, self.timeout).map_err(map_io_error)?;
        let left = time_left(deadline).ok_or(MirrorError::Timeout)?;
        stream.set_write_timeout(Some(left)).map_err(map_io_error)?;
        stream.write_all(&self.request).map_err(map_io_error)?;

        let mut buf = Vec::with_capacity(256);
        let mut chunk = [0u8; 256];
        loop {
            let left = time_left(deadline).ok_or(MirrorError::Timeout)?;
            stream.set_read_timeout(Some(left)).map_err(map_io_error)?;
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    if buf.len() > MAX_RESPONSE_LEN {
                        return Err(MirrorError::Malformed);
                    }
                    // Stop early once a complete response is buffered.
                    if codec::parse_response(&buf).is_ok_and(|_| has_declared_length(&buf)) {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_io_error(e)),
            }
        }
        Ok(buf)
    }
}

impl StatusClient for HttpStatusClient {
    fn fetch_status(&mut self) -> Result<RelayState, MirrorError> {
        let raw = self.exchange()?;
        let response = codec::parse_response(&raw).map_err(|_| MirrorError::Malformed)?;
        if response.status != 200 {
            return Err(MirrorError::Status(response.status));
        }
        trace!("Mirror: master says {:?}", response.body);
        Ok(RelayState::from_status_text(response.body))
    }
}

/// Whether the header block carries a `Content-Length`. Without one the
/// body is delimited by connection close.
fn has_declared_length(buf: &[u8]) -> bool {
    let Some(end) = codec::find_header_end(buf) else {
        return false;
    };
    core::str::from_utf8(&buf[..end]).is_ok_and(|head| {
        head.split("\r\n")
            .filter_map(|line| line.split_once(':'))
            .any(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
    })
}

fn map_io_error(e: io::Error) -> MirrorError {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => MirrorError::Timeout,
        _ => MirrorError::Unreachable,
    }
}
