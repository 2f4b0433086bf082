//! HTTP handlers called directly with their extractors.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use axum::extract::{Path, State};
use axum::http::StatusCode;

use tollgate_node::transport::http;

use common::{forwarded, request, scripted_node};

#[tokio::test]
async fn decide_endpoint_returns_verdict() {
    let (node, _factory, mut rx) = scripted_node(1000);
    node.deploy_policy("strict", "throttle").await.unwrap();

    let body = serde_json::to_string(&request("r1")).unwrap();
    let resp = http::decide(State(node.clone()), body).await;
    assert!(resp.0.throttled);
    assert!(forwarded(&mut rx).is_empty());
}

#[tokio::test]
async fn garbage_body_fails_open() {
    let (node, _factory, _rx) = scripted_node(1000);
    node.deploy_policy("strict", "throttle").await.unwrap();

    let resp = http::decide(State(node.clone()), "{not json".to_string()).await;
    assert!(!resp.0.throttled);

    let resp = http::decide_fields(State(node), "[1, 2]".to_string()).await;
    assert!(!resp.0.throttled);
}

#[tokio::test]
async fn legacy_tuple_endpoint() {
    let (node, _factory, _rx) = scripted_node(1000);
    node.deploy_policy("strict", "throttle").await.unwrap();

    let body = serde_json::to_string(&request("r1").to_fields()).unwrap();
    let resp = http::decide_fields(State(node), body).await;
    assert!(resp.0.throttled);
}

#[tokio::test]
async fn policy_management_endpoints() {
    let (node, _factory, _rx) = scripted_node(1000);

    let resp = http::deploy_policy(State(node.clone()), Path("p".to_string()), "allow".to_string()).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = http::deploy_policy(State(node.clone()), Path("q".to_string()), "bogus".to_string()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let names = http::list_policies(State(node.clone())).await;
    assert_eq!(names.0, vec!["p"]);

    for _ in 0..2 {
        let status = http::undeploy_policy(State(node.clone()), Path("p".to_string())).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
    assert!(node.registry().is_empty());

    let text = http::metrics(State(node)).await;
    assert!(text.contains("tollgate_active_policies 0"));
}
