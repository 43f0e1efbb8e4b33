//! Fuzz target: `codec::parse_response`
//!
//! A Slave parses whatever its Master (or anything squatting on the
//! Master's address) sends back. The parser must never panic, and an
//! accepted body must lie within the input.
//!
//! cargo fuzz run fuzz_response_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use netrelay::app::state::RelayState;
use netrelay::http::codec;

fuzz_target!(|data: &[u8]| {
    if let Ok(resp) = codec::parse_response(data) {
        assert!(resp.body.len() <= data.len());
        assert!((100..=999).contains(&resp.status));
        let _ = RelayState::from_status_text(resp.body);
    }
});
