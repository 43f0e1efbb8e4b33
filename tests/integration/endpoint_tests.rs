//! Integration tests: raw request bytes → codec → endpoints → response.

use std::net::Ipv4Addr;
use std::sync::Arc;

use netrelay::app::endpoints::Endpoints;
use netrelay::app::state::{RelayState, StateStore};
use netrelay::config::CommandPolicy;
use netrelay::http::codec::{self, Response};
use netrelay::scheduler::DeferredOffTimer;

fn endpoints(policy: CommandPolicy) -> Endpoints {
    let store = Arc::new(StateStore::new());
    let timer = DeferredOffTimer::start(Arc::clone(&store)).unwrap();
    Endpoints::new(store, timer, Ipv4Addr::new(10, 0, 0, 7), policy)
}

fn call(ep: &Endpoints, raw: &str) -> Response {
    let req = codec::parse_request(raw.as_bytes()).unwrap();
    ep.dispatch(&req)
}

#[test]
fn relay_reply_echoes_state_and_ip() {
    let ep = endpoints(CommandPolicy::Permissive);
    let r = call(&ep, "GET /relay?do=on HTTP/1.1\r\nHost: 10.0.0.7\r\n\r\n");
    assert_eq!(r.status, 200);
    assert_eq!(r.content_type, codec::APPLICATION_JSON);

    let json: serde_json::Value = serde_json::from_str(&r.body).unwrap();
    assert_eq!(json["status"], "ON");
    assert_eq!(json["IP"], "10.0.0.7");
}

#[test]
fn encoded_on_value_is_decoded() {
    let ep = endpoints(CommandPolicy::Permissive);
    call(&ep, "GET /relay?do=%6f%6e HTTP/1.1\r\n\r\n");
    assert_eq!(ep.store().get(), RelayState::On);
}

#[test]
fn first_do_parameter_wins() {
    let ep = endpoints(CommandPolicy::Permissive);
    call(&ep, "GET /relay?do=on&do=off HTTP/1.1\r\n\r\n");
    assert_eq!(ep.store().get(), RelayState::On);
}

#[test]
fn method_is_ignored() {
    let ep = endpoints(CommandPolicy::Permissive);
    call(&ep, "POST /relay?do=on HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
    let r = call(&ep, "DELETE /getStatus HTTP/1.1\r\n\r\n");
    assert_eq!(r.body, "ON");
    assert_eq!(r.content_type, codec::TEXT_PLAIN);
}

#[test]
fn unknown_paths_are_404() {
    let ep = endpoints(CommandPolicy::Permissive);
    for raw in [
        "GET / HTTP/1.1\r\n\r\n",
        "GET /RELAY?do=on HTTP/1.1\r\n\r\n",
        "GET /favicon.ico HTTP/1.1\r\n\r\n",
    ] {
        let r = call(&ep, raw);
        assert_eq!(r.status, 404);
        assert_eq!(r.body, "Not Found");
    }
    assert_eq!(ep.store().get(), RelayState::Off);
}

#[test]
fn strict_policy_rejects_without_change() {
    let ep = endpoints(CommandPolicy::Strict);
    call(&ep, "GET /relay?do=on HTTP/1.1\r\n\r\n");
    let r = call(&ep, "GET /relay?do=maybe HTTP/1.1\r\n\r\n");
    assert_eq!(r.status, 400);
    let json: serde_json::Value = serde_json::from_str(&r.body).unwrap();
    assert_eq!(json["error"], "invalid command");
    assert_eq!(ep.store().get(), RelayState::On);

    call(&ep, "GET /relay?do=off HTTP/1.1\r\n\r\n");
    assert_eq!(ep.store().get(), RelayState::Off);
}

#[test]
fn sleep_answers() {
    let ep = endpoints(CommandPolicy::Permissive);
    assert_eq!(call(&ep, "GET /sleep?time=60000 HTTP/1.1\r\n\r\n").body, "1");
    assert!(ep.timer().is_armed());
    assert_eq!(call(&ep, "GET /sleep?time= HTTP/1.1\r\n\r\n").body, "0");
    assert_eq!(call(&ep, "GET /sleep?time=-5 HTTP/1.1\r\n\r\n").body, "0");
    assert!(ep.timer().cancel());
}
