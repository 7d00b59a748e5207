//! AJAX endpoint routing calls through the dispatcher.

use std::collections::BTreeMap;

use axum::{
    extract::{Form, State, rejection::FormRejection},
    response::Json,
};
use serde_json::Value;

use crate::dispatch::CallRequest;
use crate::error::ApiError;
use crate::server::AppState;

/// Runs the handler selected by the `call_type` form field
#[utoipa::path(
    post,
    path = "/admin/ajax",
    request_body(
        content = BTreeMap<String, String>,
        content_type = "application/x-www-form-urlencoded",
        description = "`call_type`, `nonce` and the call parameters"
    ),
    responses(
        (status = 200, description = "JSON result of the dispatched call"),
        (status = 400, description = "Missing call parameter", body = ApiError),
        (status = 401, description = "Missing or invalid operator token", body = ApiError),
        (status = 403, description = "Invalid nonce", body = ApiError),
        (status = 404, description = "Unknown call type or source", body = ApiError),
        (status = 502, description = "Source backend error", body = ApiError),
        (status = 503, description = "Source backend not configured", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn ajax_call(
    State(state): State<AppState>,
    form: Result<Form<BTreeMap<String, String>>, FormRejection>,
) -> Result<Json<Value>, ApiError> {
    let Form(form) = form?;
    let request = CallRequest::from_form(form);
    state.dispatcher.dispatch(&request).await.map(Json)
}
