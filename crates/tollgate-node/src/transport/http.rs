//! HTTP handlers.
//!
//! Decision endpoints never answer with an error status for evaluation
//! faults: a body that cannot be understood is logged and allowed, keeping
//! the "never break traffic" contract with the upstream gateway.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use tollgate_core::protocol::ThrottleRequest;

use crate::app_state::AppState;

#[derive(Debug, Serialize)]
pub struct DecisionBody {
    pub throttled: bool,
}

pub async fn decide(State(state): State<AppState>, body: String) -> Json<DecisionBody> {
    let throttled = match serde_json::from_str::<ThrottleRequest>(&body) {
        Ok(request) => state.decide(request).await,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable decide body; failing open");
            false
        }
    };
    Json(DecisionBody { throttled })
}

pub async fn decide_fields(State(state): State<AppState>, body: String) -> Json<DecisionBody> {
    let throttled = match serde_json::from_str::<Vec<Value>>(&body) {
        Ok(fields) => state.coordinator().decide_fields(&fields).await,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable decide tuple; failing open");
            false
        }
    };
    Json(DecisionBody { throttled })
}

pub async fn deploy_policy(
    State(state): State<AppState>,
    Path(name): Path<String>,
    definition: String,
) -> Response {
    match state.deploy_policy(&name, &definition).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::warn!(policy = %name, error = %e, "policy deploy rejected");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "code": e.kind().as_str(), "msg": e.to_string() })),
            )
                .into_response()
        }
    }
}

pub async fn undeploy_policy(State(state): State<AppState>, Path(name): Path<String>) -> StatusCode {
    state.undeploy_policy(&name).await;
    StatusCode::NO_CONTENT
}

pub async fn list_policies(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.registry().names())
}

pub async fn metrics(State(state): State<AppState>) -> String {
    state.render_metrics()
}
