//! Inbound HTTP listener.
//!
//! Implements [`RequestPort`] over a non-blocking `std::net::TcpListener`.
//! ESP-IDF's lwIP exposes BSD sockets through `std::net`, so the same code
//! runs on the device and on the host (tests bind port `0`).
//!
//! ## Connection model
//!
//! 1. `bind()` opens the listener in non-blocking mode.
//! 2. `serve_pending()` accepts at most `max` waiting clients. Each
//!    accepted socket is switched back to blocking I/O.
//! 3. The header block is read against a deadline of `request_timeout`
//!    from accept, parsed, handed to the handler, and the response is
//!    written with `Connection: close` against a second deadline of the
//!    same length. Every `read()`/`write()` gets only the time left, so a
//!    client trickling bytes cannot stretch the connection.
//! 4. When no client is waiting `accept()` returns `WouldBlock` and the
//!    call returns immediately.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::app::ports::RequestPort;
use crate::error::HttpError;
use crate::http::codec::{self, MAX_HEADER_LEN, Request, Response};
use crate::http::time_left;

const READ_CHUNK: usize = 256;
/// Upper bound on discarding unread input after a rejected request.
pub const DRAIN_TIMEOUT: Duration = Duration::from_millis(50);
const MAX_DRAIN: usize = 4 * MAX_HEADER_LEN;

/// Single-threaded HTTP/1.x server for the relay API.
pub struct HttpListener {
    listener: TcpListener,
    request_timeout: Duration,
    served: u64,
}

impl HttpListener {
    /// Bind `0.0.0.0:<port>`. Pass port `0` to let the OS pick a free port
    /// (use [`local_addr()`](Self::local_addr) to discover it).
    pub fn bind(port: u16, request_timeout: Duration) -> io::Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        info!("HTTP: listening on port {}", listener.local_addr()?.port());
        Ok(Self {
            listener,
            request_timeout,
            served: 0,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Total requests answered since bind (including error responses).
    pub fn served(&self) -> u64 {
        self.served
    }

    fn handle_connection(
        &mut self,
        mut stream: TcpStream,
        peer: SocketAddr,
        handler: &mut dyn FnMut(&Request) -> Response,
    ) {
        if let Err(e) = self.prepare(&stream) {
            warn!("HTTP: cannot configure socket for {}: {}", peer, e);
            return;
        }

        let deadline = Instant::now() + self.request_timeout;
        let parsed = match read_header_block(&mut stream, deadline) {
            Ok(head) => codec::parse_request(&head),
            // Client connected and left without sending anything.
            Err(ReadFailure::Closed) => return,
            Err(ReadFailure::Http(e)) => Err(e),
        };
        let (response, rejected) = match parsed {
            Ok(req) => {
                debug!("HTTP: {} {} from {}", req.method, req.path, peer);
                (handler(&req), false)
            }
            Err(e) => {
                debug!("HTTP: bad request from {}: {}", peer, e);
                (error_response(e), true)
            }
        };

        let deadline = Instant::now() + self.request_timeout;
        if let Err(e) = write_before(&mut stream, &response.encode(), deadline) {
            debug!("HTTP: write to {} failed: {}", peer, e);
        }
        let _ = stream.shutdown(Shutdown::Write);
        if rejected {
            // Unread input at close turns the FIN into a RST, which can
            // destroy the error response before the client reads it.
            drain(&mut stream);
        }
        self.served += 1;
    }

    fn prepare(&self, stream: &TcpStream) -> io::Result<()> {
        // Accepted sockets may inherit the listener's non-blocking flag.
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)
    }
}

impl RequestPort for HttpListener {
    fn serve_pending(
        &mut self,
        max: usize,
        handler: &mut dyn FnMut(&Request) -> Response,
    ) -> usize {
        let mut handled = 0;
        while handled < max {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    self.handle_connection(stream, peer, handler);
                    handled += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("HTTP: accept failed: {}", e);
                    break;
                }
            }
        }
        handled
    }
}

enum ReadFailure {
    Closed,
    Http(HttpError),
}

/// Read until the end of the header block, EOF, the size limit, or
/// `deadline`.
fn read_header_block(stream: &mut TcpStream, deadline: Instant) -> Result<Vec<u8>, ReadFailure> {
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let Some(left) = time_left(deadline) else {
            return Err(if buf.is_empty() {
                ReadFailure::Closed
            } else {
                ReadFailure::Http(HttpError::Io)
            });
        };
        if stream.set_read_timeout(Some(left)).is_err() {
            return Err(ReadFailure::Http(HttpError::Io));
        }
        let n = match stream.read(&mut chunk) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) if buf.is_empty() => return Err(ReadFailure::Closed),
            Err(_) => return Err(ReadFailure::Http(HttpError::Io)),
        };
        if n == 0 {
            return if buf.is_empty() {
                Err(ReadFailure::Closed)
            } else {
                Err(ReadFailure::Http(HttpError::Incomplete))
            };
        }
        buf.extend_from_slice(&chunk[..n]);
        if codec::find_header_end(&buf).is_some() {
            return Ok(buf);
        }
        if buf.len() >= MAX_HEADER_LEN {
            return Err(ReadFailure::Http(HttpError::TooLarge));
        }
    }
}

/// Write all of `bytes` or fail once `deadline` passes.
fn write_before(stream: &mut TcpStream, mut bytes: &[u8], deadline: Instant) -> io::Result<()> {
    while !bytes.is_empty() {
        let left = time_left(deadline).ok_or(io::ErrorKind::TimedOut)?;
        stream.set_write_timeout(Some(left))?;
        match stream.write(bytes) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => bytes = &bytes[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    stream.flush()
}

/// Discard whatever the client is still sending, bounded in time and size.
fn drain(stream: &mut TcpStream) {
    let deadline = Instant::now() + DRAIN_TIMEOUT;
    let mut chunk = [0u8; READ_CHUNK];
    let mut total = 0;
    while total < MAX_DRAIN {
        let Some(left) = time_left(deadline) else {
            break;
        };
        if stream.set_read_timeout(Some(left)).is_err() {
            break;
        }
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => total += n,
        }
    }
}

fn error_response(e: HttpError) -> Response {
    let status = e.status_code();
    Response::text(status, codec::reason_phrase(status))
}
