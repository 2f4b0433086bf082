//! Correlation key and downstream event tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::BTreeMap;

use serde_json::json;

use tollgate_core::protocol::{parse_stream_id, stream_id, CorrelationKey, DownstreamEvent, ThrottleRequest};

fn request(props: Option<BTreeMap<String, String>>) -> ThrottleRequest {
    ThrottleRequest {
        unique_key: "req-9".into(),
        consumer_key: "consumer-a".into(),
        api_context: "/pizzashack".into(),
        api_version: "1.0.0".into(),
        resource_key: "/menu".into(),
        http_verb: "POST".into(),
        properties: props,
        trailing: Vec::new(),
    }
}

#[test]
fn correlation_keys_with_same_request_key_differ_by_seq() {
    let a = CorrelationKey::new("dup", 1);
    let b = CorrelationKey::new("dup", 2);
    assert_ne!(a, b);
    assert_eq!(a.request_key(), b.request_key());
    assert_eq!(a.to_string(), "dup#1");
}

#[test]
fn downstream_event_stringifies_properties() {
    let mut props = BTreeMap::new();
    props.insert("ip".to_string(), "10.0.0.1".to_string());
    let ev = DownstreamEvent::from_request("throttle.request.stream:1.0.0", &request(Some(props)));

    assert_eq!(ev.stream_id, "throttle.request.stream:1.0.0");
    assert_eq!(ev.unique_key(), Some("req-9"));
    assert_eq!(ev.fields[6], json!(r#"{"ip":"10.0.0.1"}"#));
    assert!(ev.timestamp_ms > 0);
}

#[test]
fn downstream_event_keeps_null_properties() {
    let ev = DownstreamEvent::from_request("s:1", &request(None));
    assert_eq!(ev.fields[6], json!(null));
}

#[test]
fn downstream_event_keeps_trailing_fields() {
    let mut req = request(None);
    req.trailing = vec![json!("extra-7"), json!(42)];
    let ev = DownstreamEvent::from_request("s:1", &req);
    assert_eq!(ev.fields.len(), 9);
    assert_eq!(ev.fields[6], json!(null));
    assert_eq!(ev.fields[7], json!("extra-7"));
    assert_eq!(ev.fields[8], json!(42));
}

#[test]
fn stream_id_round_trip() {
    let id = stream_id("throttle.request.stream", "1.0.0");
    assert_eq!(parse_stream_id(&id).unwrap(), ("throttle.request.stream", "1.0.0"));
}

#[test]
fn malformed_stream_ids() {
    for bad in ["nocolon", ":1.0.0", "name:", "a:b:c"] {
        assert!(parse_stream_id(bad).is_err(), "{bad} must be rejected");
    }
}
