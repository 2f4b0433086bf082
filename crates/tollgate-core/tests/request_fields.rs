//! Legacy tuple decoding tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use serde_json::json;

use tollgate_core::protocol::ThrottleRequest;

fn tuple() -> Vec<serde_json::Value> {
    vec![
        json!("req-1"),
        json!("consumer-a"),
        json!("/pizzashack"),
        json!("1.0.0"),
        json!("/menu"),
        json!("GET"),
        json!({ "ip": "10.0.0.1", "retries": 3 }),
    ]
}

#[test]
fn parse_full_tuple() {
    let req = ThrottleRequest::from_fields(&tuple()).unwrap();
    assert_eq!(req.unique_key, "req-1");
    assert_eq!(req.api_context, "/pizzashack");
    assert_eq!(req.http_verb, "GET");
    assert_eq!(req.property("ip"), Some("10.0.0.1"));
    // non-string property values are kept in their JSON form
    assert_eq!(req.property("retries"), Some("3"));
}

#[test]
fn properties_may_be_null_or_missing() {
    let mut t = tuple();
    t[6] = json!(null);
    assert!(ThrottleRequest::from_fields(&t).unwrap().properties.is_none());

    t.truncate(6);
    assert!(ThrottleRequest::from_fields(&t).unwrap().properties.is_none());
}

#[test]
fn trailing_fields_are_carried_through() {
    let mut t = tuple();
    t.push(json!("extra"));
    t.push(json!(42));
    let req = ThrottleRequest::from_fields(&t).unwrap();
    assert_eq!(req.resource_key, "/menu");
    assert_eq!(req.trailing, vec![json!("extra"), json!(42)]);

    let fields = req.to_fields();
    assert_eq!(fields.len(), 9);
    assert_eq!(fields[7..], [json!("extra"), json!(42)]);
}

#[test]
fn no_trailing_fields_without_properties_slot() {
    let req = ThrottleRequest::from_fields(&tuple()[..6]).unwrap();
    assert!(req.trailing.is_empty());
    assert_eq!(req.to_fields().len(), 7);
}

#[test]
fn short_tuple_is_rejected() {
    let err = ThrottleRequest::from_fields(&tuple()[..4]).unwrap_err();
    assert_eq!(err.kind().as_str(), "BAD_REQUEST");
}

#[test]
fn non_string_field_is_rejected() {
    let mut t = tuple();
    t[2] = json!(12);
    let err = ThrottleRequest::from_fields(&t).unwrap_err();
    assert!(err.to_string().contains("api context"));
}

#[test]
fn empty_unique_key_is_rejected() {
    let mut t = tuple();
    t[0] = json!("");
    assert!(ThrottleRequest::from_fields(&t).is_err());
}

#[test]
fn array_properties_are_rejected() {
    let mut t = tuple();
    t[6] = json!(["ip"]);
    let err = ThrottleRequest::from_fields(&t).unwrap_err();
    assert_eq!(err.kind().as_str(), "BAD_REQUEST");
}

#[test]
fn to_fields_keeps_positions() {
    let req = ThrottleRequest::from_fields(&tuple()).unwrap();
    let fields = req.to_fields();
    assert_eq!(fields.len(), 7);
    assert_eq!(fields[2], json!("/pizzashack"));
    assert_eq!(fields[6]["ip"], json!("10.0.0.1"));
}

#[test]
fn json_body_rejects_unknown_fields() {
    let body = r#"{
        "unique_key": "k", "consumer_key": "c", "api_context": "/a",
        "api_version": "1", "resource_key": "/r", "http_verb": "GET",
        "propertiez": {}
    }"#;
    assert!(serde_json::from_str::<ThrottleRequest>(body).is_err());
}
