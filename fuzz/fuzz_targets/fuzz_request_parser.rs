//! Fuzz target: `codec::parse_request`
//!
//! Feeds arbitrary bytes (as a client could send them) into the request
//! parser and checks that it never panics and that anything it accepts
//! fits the header limit and routes by an absolute path.
//!
//! cargo fuzz run fuzz_request_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use netrelay::http::codec::{self, MAX_HEADER_LEN};

fuzz_target!(|data: &[u8]| {
    if let Ok(req) = codec::parse_request(data) {
        let end = codec::find_header_end(data).expect("accepted request without header end");
        assert!(end <= MAX_HEADER_LEN, "accepted oversize header block");
        assert!(req.path.starts_with('/'), "path must be absolute");
        assert!(!req.method.is_empty());
    }
});
