//! Envelope vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;

use stark_core::protocol::{Envelope, SubscribePayload};

fn load(name: &str) -> String {
    fs::read_to_string(format!("tests/vectors/{name}")).unwrap()
}

#[test]
fn parse_envelope_min() {
    let env = Envelope::decode(&load("envelope_min.json")).unwrap();
    assert_eq!(env.action, "ping");
    assert_eq!(env.id, "Zk3p9QaB");
    assert_eq!(env.src, "broker");
    assert!(env.version.is_empty());
    assert!(env.corr.is_none());
    assert!(env.p.is_none());
}

#[test]
fn parse_envelope_full() {
    let env = Envelope::decode(&load("envelope_full.json")).unwrap();
    assert_eq!(env.version, "0.5");
    assert_eq!(env.dst.as_deref(), Some("web-AB12CD34"));
    assert_eq!(env.corr.as_deref(), Some("Qx81mPzA"));
    assert_eq!(env.text.as_deref(), Some("Reminder set for 17:00."));
    let p = env.p.unwrap();
    assert_eq!(p["text"], "remind me at 5");
}

#[test]
fn unknown_fields_are_tolerated() {
    let env = Envelope::decode(&load("envelope_unknown_fields.json")).unwrap();
    assert_eq!(env.action, "event/new");
    assert!(env.p.is_none());
}

#[test]
fn malformed_frame_is_a_decode_error() {
    let err = Envelope::decode(&load("envelope_malformed.txt")).expect_err("must fail");
    assert_eq!(err.code().as_str(), "DECODE");
}

#[test]
fn subscribe_payload_omits_missing_device() {
    let unscoped = serde_json::to_value(SubscribePayload::new("ping", None)).unwrap();
    assert_eq!(unscoped, serde_json::json!({"action": "ping"}));

    let scoped =
        serde_json::to_value(SubscribePayload::new("ping", Some("web-AB12CD34".into()))).unwrap();
    assert_eq!(
        scoped,
        serde_json::json!({"action": "ping", "device": "web-AB12CD34"})
    );
}
