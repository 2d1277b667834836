#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use stark_client::config::{self, DrainOrder};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
client:
  host: "localhost:8080"
  request_timout_ms: 5000 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "BAD_REQUEST");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
client:
  host: "localhost:8080"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.client.stream_url(), "ws://localhost:8080/stream/stark");
    assert_eq!(cfg.client.request_timeout(), Duration::from_secs(300));
    assert_eq!(cfg.client.drain_order, DrainOrder::Fifo);
    assert!(cfg.client.device().as_str().starts_with("web-"));
}

#[test]
fn full_config() {
    let ok = r#"
version: 1
client:
  host: "stark.example.org"
  secure: true
  device_id: "web-AB12CD34"
  request_timeout_ms: 60000
  drain_order: lifo
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.client.stream_url(), "wss://stark.example.org/stream/stark");
    assert_eq!(cfg.client.device().as_str(), "web-AB12CD34");
    let opts = cfg.client.session_options();
    assert_eq!(opts.request_timeout, Duration::from_secs(60));
    assert_eq!(opts.drain_order, DrainOrder::Lifo);
}

#[test]
fn unsupported_version() {
    let bad = r#"
version: 2
client:
  host: "localhost"
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn host_must_not_carry_scheme_or_path() {
    for host in ["ws://localhost", "localhost/stream", "  "] {
        let bad = format!("version: 1\nclient:\n  host: \"{host}\"\n");
        let err = config::load_from_str(&bad).expect_err("must fail");
        assert_eq!(err.code().as_str(), "BAD_REQUEST", "host {host:?}");
    }
}

#[test]
fn request_timeout_range() {
    let bad = r#"
version: 1
client:
  host: "localhost"
  request_timeout_ms: 10
"#;
    assert!(config::load_from_str(bad).is_err());
}
