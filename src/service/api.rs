//! Handlers for `/health` and `/run`.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::events;
use crate::recipes::DEFAULT_RECIPE;
use crate::runner::{RunError, RunRequest};

use super::ServiceState;

/// Build a JSON error response body.
fn json_error(code: &str, msg: impl std::fmt::Display) -> Json<Value> {
    Json(json!({ "error": code, "message": format!("{msg}") }))
}

fn run_error_response(e: &RunError) -> Response {
    let (status, code) = match e {
        RunError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        RunError::UnknownRecipe(_) => (StatusCode::BAD_REQUEST, "unknown_recipe"),
        RunError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
        RunError::Engine(_) => (StatusCode::INTERNAL_SERVER_ERROR, "engine_error"),
        RunError::Persist(_) => (StatusCode::INTERNAL_SERVER_ERROR, "persist_error"),
    };
    (status, json_error(code, e)).into_response()
}

/// GET /health
pub(super) async fn health(State(state): State<ServiceState>) -> Response {
    let runner = &state.runner;
    let body = json!({
        "status": "ok",
        "time_utc": events::timestamp_now(),
        "default_recipe": DEFAULT_RECIPE,
        "default_model": runner.models().summary_fast,
        "recipes": runner.recipes().names(),
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// POST /run
pub(super) async fn run(
    State(state): State<ServiceState>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Response {
    let mut req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "rejected run request body");
            return (StatusCode::BAD_REQUEST, json_error("invalid_request", rejection.body_text())).into_response();
        }
    };
    req.meta
        .entry("source")
        .or_insert_with(|| Value::from("api"));

    let runner = state.runner.clone();
    match tokio::task::spawn_blocking(move || runner.run(&req)).await {
        Ok(Ok(event)) => (StatusCode::OK, Json(json!({ "status": "ok", "event": event }))).into_response(),
        Ok(Err(e)) => {
            warn!(error = %e, "run failed");
            run_error_response(&e)
        }
        Err(e) => {
            error!(error = %e, "run task panicked or was cancelled");
            (StatusCode::INTERNAL_SERVER_ERROR, json_error("internal", e)).into_response()
        }
    }
}
