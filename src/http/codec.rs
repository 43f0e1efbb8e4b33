//! Minimal HTTP/1.x codec for the relay API.
//!
//! Only what the API needs: parse a request line plus header block into a
//! [`Request`] (path + decoded query parameters), encode a [`Response`], and
//! parse the status line and body of a response from another node. Bodies
//! of inbound requests are ignored; every route is driven by the query
//! string.
//!
//! ```text
//! GET /sleep?time=500 HTTP/1.1\r\n      ──▶  Request { path: "/sleep",
//! Host: 192.168.0.100\r\n                              query: [("time","500")] }
//! \r\n
//! ```

use core::fmt::Write as _;

use crate::error::HttpError;

/// Largest request header block accepted (request line + headers).
pub const MAX_HEADER_LEN: usize = 2048;

const HEADER_END: &[u8] = b"\r\n\r\n";

// ───────────────────────────────────────────────────────────────
// Request
// ───────────────────────────────────────────────────────────────

/// A parsed inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    query: Vec<(String, String)>,
}

impl Request {
    /// Build a GET request for `path` with already-decoded parameters.
    pub fn get(path: &str, params: &[(&str, &str)]) -> Self {
        Self {
            method: "GET".into(),
            path: path.into(),
            query: params
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    /// First value of query parameter `name`, if present.
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Index just past the `\r\n\r\n` that ends the header block, if present.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_END.len())
        .position(|w| w == HEADER_END)
        .map(|i| i + HEADER_END.len())
}

/// Parse the request line of a complete header block.
///
/// `buf` must contain the whole header block; anything after it is ignored.
pub fn parse_request(buf: &[u8]) -> Result<Request, HttpError> {
    let end = match find_header_end(buf) {
        Some(end) => end,
        None if buf.len() >= MAX_HEADER_LEN => return Err(HttpError::TooLarge),
        None => return Err(HttpError::Incomplete),
    };
    if end > MAX_HEADER_LEN {
        return Err(HttpError::TooLarge);
    }

    let head = core::str::from_utf8(&buf[..end]).map_err(|_| HttpError::Malformed)?;
    let line = head.split("\r\n").next().ok_or(HttpError::Malformed)?;

    let mut parts = line.split(' ');
    let method = parts.next().filter(|m| is_token(m)).ok_or(HttpError::Malformed)?;
    let target = parts.next().filter(|t| t.starts_with('/')).ok_or(HttpError::Malformed)?;
    let version = parts.next().ok_or(HttpError::Malformed)?;
    if parts.next().is_some() || !version.starts_with("HTTP/1.") {
        return Err(HttpError::Malformed);
    }

    let (raw_path, raw_query) = match target.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (target, None),
    };
    let path = percent_decode(raw_path, false).ok_or(HttpError::Malformed)?;
    let query = match raw_query {
        Some(q) => parse_query(q)?,
        None => Vec::new(),
    };

    Ok(Request {
        method: method.to_string(),
        path,
        query,
    })
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphabetic())
}

/// Decode `a=1&b=x+y&flag` into ordered `(name, value)` pairs.
fn parse_query(raw: &str) -> Result<Vec<(String, String)>, HttpError> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let k = percent_decode(k, true).ok_or(HttpError::Malformed)?;
            let v = percent_decode(v, true).ok_or(HttpError::Malformed)?;
            Ok((k, v))
        })
        .collect()
}

/// Decode `%XX` escapes (and `+` as space when `plus_as_space`).
/// Returns `None` on a truncated escape or invalid UTF-8 result.
pub fn percent_decode(s: &str, plus_as_space: bool) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hi = hex_val(*bytes.get(i + 1)?)?;
                let lo = hex_val(*bytes.get(i + 2)?)?;
                out.push((hi << 4) | lo);
                i += 3;
            }
            b'+' if plus_as_space => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

// ───────────────────────────────────────────────────────────────
// Response
// ───────────────────────────────────────────────────────────────

pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_JSON: &str = "application/json";

/// An outbound response. Always sent with `Connection: close`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: TEXT_PLAIN,
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: APPLICATION_JSON,
            body: body.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::text(404, "Not Found")
    }

    /// Serialise status line, headers and body.
    pub fn encode(&self) -> Vec<u8> {
        let mut head = String::with_capacity(128);
        let _ = write!(
            head,
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            reason_phrase(self.status),
            self.content_type,
            self.body.len()
        );
        let mut out = head.into_bytes();
        out.extend_from_slice(self.body.as_bytes());
        out
    }
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Status code and body of a response received from another node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedResponse<'a> {
    pub status: u16,
    pub body: &'a str,
}

/// Parse a complete response (the peer closes the connection after it).
///
/// Honours `Content-Length` when present; otherwise the body runs to the
/// end of `buf`.
pub fn parse_response(buf: &[u8]) -> Result<ParsedResponse<'_>, HttpError> {
    let end = find_header_end(buf).ok_or(HttpError::Incomplete)?;
    let head = core::str::from_utf8(&buf[..end]).map_err(|_| HttpError::Malformed)?;
    let mut lines = head.split("\r\n");

    let status_line = lines.next().ok_or(HttpError::Malformed)?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().ok_or(HttpError::Malformed)?;
    if !version.starts_with("HTTP/1.") {
        return Err(HttpError::Malformed);
    }
    let status = parts
        .next()
        .filter(|code| code.len() == 3 && code.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|code| code.parse::<u16>().ok())
        .filter(|code| *code >= 100)
        .ok_or(HttpError::Malformed)?;

    let mut content_length = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                let len = value.trim().parse::<usize>().map_err(|_| HttpError::Malformed)?;
                content_length = Some(len);
            }
        }
    }

    let rest = &buf[end..];
    let body = match content_length {
        Some(len) if len <= rest.len() => &rest[..len],
        Some(_) => return Err(HttpError::Incomplete),
        None => rest,
    };
    let body = core::str::from_utf8(body).map_err(|_| HttpError::Malformed)?;
    Ok(ParsedResponse { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_path_and_query() {
        let req = parse_request(b"GET /relay?do=on HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/relay");
        assert_eq!(req.arg("do"), Some("on"));
        assert_eq!(req.arg("time"), None);
    }

    #[test]
    fn first_duplicate_parameter_wins() {
        let req = parse_request(b"GET /relay?do=on&do=off HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(req.arg("do"), Some("on"));
    }

    #[test]
    fn decodes_escapes_and_plus() {
        let req = parse_request(b"GET /x?a=%6Fn&b=two+words&flag HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.arg("a"), Some("on"));
        assert_eq!(req.arg("b"), Some("two words"));
        assert_eq!(req.arg("flag"), Some(""));
    }

    #[test]
    fn any_method_is_accepted() {
        let req = parse_request(b"POST /getStatus HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/getStatus");
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_request(b"hello\r\n\r\n"), Err(HttpError::Malformed));
        assert_eq!(parse_request(b"GET relay HTTP/1.1\r\n\r\n"), Err(HttpError::Malformed));
        assert_eq!(parse_request(b"GET /relay SPDY/3\r\n\r\n"), Err(HttpError::Malformed));
        assert_eq!(parse_request(b"GET /x?a=%G1 HTTP/1.1\r\n\r\n"), Err(HttpError::Malformed));
    }

    #[test]
    fn incomplete_and_oversize() {
        assert_eq!(parse_request(b"GET / HTTP/1.1\r\n"), Err(HttpError::Incomplete));
        let big = vec![b'a'; MAX_HEADER_LEN];
        assert_eq!(parse_request(&big), Err(HttpError::TooLarge));
    }

    #[test]
    fn response_encoding() {
        let wire = Response::text(200, "ON").encode();
        let text = String::from_utf8(wire).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(text.ends_with("\r\n\r\nON"));
    }

    #[test]
    fn not_found_response() {
        let r = Response::not_found();
        assert_eq!(r.status, 404);
        assert_eq!(r.body, "Not Found");
    }

    #[test]
    fn parses_own_response_format() {
        let wire = Response::json(200, r#"{"status":"ON"}"#).encode();
        let parsed = parse_response(&wire).unwrap();
        assert_eq!(parsed.status, 200);
        assert_eq!(parsed.body, r#"{"status":"ON"}"#);
    }

    #[test]
    fn response_without_content_length_reads_to_end() {
        let parsed = parse_response(b"HTTP/1.0 200 OK\r\nServer: esp\r\n\r\nOFF").unwrap();
        assert_eq!(parsed.body, "OFF");
    }

    #[test]
    fn response_content_length_trims_trailing_bytes() {
        let parsed = parse_response(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nONxx").unwrap();
        assert_eq!(parsed.body, "ON");
    }

    #[test]
    fn truncated_response_body_is_incomplete() {
        assert_eq!(
            parse_response(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nON"),
            Err(HttpError::Incomplete)
        );
        assert_eq!(parse_response(b"garbage\r\n\r\n"), Err(HttpError::Malformed));
        assert_eq!(parse_response(b"HTTP/1.1 +20 OK\r\n\r\n"), Err(HttpError::Malformed));
        assert_eq!(parse_response(b"HTTP/1.1 000 OK\r\n\r\n"), Err(HttpError::Malformed));
    }
}
