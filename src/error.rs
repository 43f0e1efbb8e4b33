//! Unified error types for the NetRelay firmware.
//!
//! Each subsystem has a small `Copy` error enum; all of them convert into
//! the top-level [`Error`], which keeps the boot path in `main` uniform.
//! None of these are fatal to the control loop: request errors become HTTP
//! status codes, mirror errors leave the relay state untouched.

use core::fmt;

use crate::app::ports::ConfigError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An inbound HTTP request could not be read or parsed.
    Http(HttpError),
    /// The Master could not be polled.
    Mirror(MirrorError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Peripheral or socket initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "http: {e}"),
            Self::Mirror(e) => write!(f, "mirror: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// HTTP errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    /// The header block has not been fully received yet.
    Incomplete,
    /// Request or status line is not valid HTTP/1.x.
    Malformed,
    /// Header block exceeds the fixed receive buffer.
    TooLarge,
    /// Socket read/write failed or timed out mid-request.
    Io,
}

impl HttpError {
    /// Status code used when answering a request that failed with `self`.
    pub const fn status_code(self) -> u16 {
        match self {
            Self::TooLarge => 431,
            Self::Incomplete | Self::Malformed | Self::Io => 400,
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incomplete => write!(f, "incomplete request"),
            Self::Malformed => write!(f, "malformed request"),
            Self::TooLarge => write!(f, "request header too large"),
            Self::Io => write!(f, "socket I/O error"),
        }
    }
}

impl From<HttpError> for Error {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}

// ---------------------------------------------------------------------------
// Remote mirror errors
// ---------------------------------------------------------------------------

/// Why a poll of the Master's status endpoint failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorError {
    /// Connection refused, reset, or no route to the Master.
    Unreachable,
    /// Connect or read exceeded the mirror timeout.
    Timeout,
    /// The Master answered with a non-200 status code.
    Status(u16),
    /// The response was not parseable HTTP.
    Malformed,
}

impl fmt::Display for MirrorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => write!(f, "master unreachable"),
            Self::Timeout => write!(f, "master timed out"),
            Self::Status(code) => write!(f, "master answered HTTP {code}"),
            Self::Malformed => write!(f, "malformed response from master"),
        }
    }
}

impl From<MirrorError> for Error {
    fn from(e: MirrorError) -> Self {
        Self::Mirror(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
