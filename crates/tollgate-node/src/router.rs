//! Axum router wiring.

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{app_state::AppState, transport::http};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/decide", post(http::decide))
        .route("/v1/decide/fields", post(http::decide_fields))
        .route("/v1/policies", get(http::list_policies))
        .route(
            "/v1/policies/:name",
            put(http::deploy_policy).delete(http::undeploy_policy),
        )
        .route("/metrics", get(http::metrics))
        .with_state(state)
}
