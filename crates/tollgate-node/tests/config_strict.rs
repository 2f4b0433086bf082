#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use tollgate_node::config::{self, TimeoutPolicy};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
throttler:
  decision_timeout_ms: 500
  on_timout: fail_closed # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.kind().as_str(), "BAD_REQUEST");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.throttler.decision_timeout_ms, 1000);
    assert_eq!(cfg.throttler.on_timeout, TimeoutPolicy::FailOpen);
    assert!(cfg.downstream.enabled);
    assert_eq!(cfg.downstream.request_stream_id, "throttle.request.stream:1.0.0");
    assert!(cfg.policies.is_empty());
}

#[test]
fn full_config() {
    let ok = r#"
version: 1
node:
  listen: "127.0.0.1:9000"
throttler:
  decision_timeout_ms: 250
  on_timeout: fail_closed
  evaluator_queue_depth: 16
  stop_timeout_ms: 2000
downstream:
  enabled: false
  request_stream_id: "org.example.request:2.0.0"
  buffer: 8
policies:
  - name: "rate-limit-10rps"
    definition: |
      limit: { rps: 10, burst: 10 }
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.node.listen, "127.0.0.1:9000");
    assert_eq!(cfg.throttler.on_timeout, TimeoutPolicy::FailClosed);
    assert!(cfg.throttler.on_timeout.outcome());
    assert_eq!(cfg.throttler.decision_timeout().as_millis(), 250);
    assert!(!cfg.downstream.enabled);
    assert_eq!(cfg.policies[0].name, "rate-limit-10rps");
}

#[test]
fn unsupported_version() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(err.kind().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn timeout_out_of_range() {
    let err = config::load_from_str("version: 1\nthrottler:\n  decision_timeout_ms: 0\n")
        .expect_err("must fail");
    assert!(err.to_string().contains("decision_timeout_ms"));
}

#[test]
fn malformed_stream_id() {
    let err = config::load_from_str("version: 1\ndownstream:\n  request_stream_id: nocolon\n")
        .expect_err("must fail");
    assert_eq!(err.kind().as_str(), "BAD_REQUEST");
}

#[test]
fn duplicate_boot_policy_names() {
    let bad = r#"
version: 1
policies:
  - { name: "p", definition: "limit: { rps: 1, burst: 1 }" }
  - { name: "p", definition: "limit: { rps: 2, burst: 2 }" }
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert!(err.to_string().contains("duplicate policy name"));
}
