//! Router-level tests for the admin pages.

use anyhow::Result;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use serde_json::Value;
use tower::ServiceExt;
use zoro_lite::action_token::{ADD_PROVIDER_ACTION, AJAX_ACTION, REVOKE_PROVIDER_ACTION};
use zoro_lite::server::{AppState, create_app};
use zoro_lite::sources::SYSTEM_SITE_NAME;

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::{OPERATOR_TOKEN, provider_string, test_state};

fn app(state: &AppState) -> Router {
    create_app(state.clone())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {OPERATOR_TOKEN}"))
        .body(Body::empty())
        .unwrap()
}

fn post_form(uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
    let body = fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, url_encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {OPERATOR_TOKEN}"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

fn url_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn add_provider_redirects_and_lists_it_with_notice() -> Result<()> {
    let state = test_state().await?;
    let token = state.tokens.create(ADD_PROVIDER_ACTION);

    let response = app(&state)
        .oneshot(post_form(
            "/admin/providers/new",
            &[
                ("zl_provider_string", provider_string("acme").as_str()),
                ("token", token.as_str()),
            ],
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/providers");

    let page = json_body(app(&state).oneshot(get("/admin/providers?page=zl")).await?).await;
    assert_eq!(page["providers"].as_array().unwrap().len(), 1);
    assert_eq!(page["providers"][0]["provider"], "acme");
    assert_eq!(page["notices"][0]["level"], "success");
    assert_eq!(
        page["notices"][0]["message"],
        "Success added the provider to database"
    );
    assert!(page["tokens"]["revoke"].is_string());
    assert!(page["tokens"]["ajax"].is_string());

    // Notices are displayed once.
    let again = json_body(app(&state).oneshot(get("/admin/providers")).await?).await;
    assert!(again["notices"].as_array().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn invalid_provider_string_redirects_back_to_form() -> Result<()> {
    let state = test_state().await?;
    let token = state.tokens.create(ADD_PROVIDER_ACTION);

    let response = app(&state)
        .oneshot(post_form(
            "/admin/providers/new",
            &[("zl_provider_string", "@@@"), ("token", token.as_str())],
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/providers/new");

    let page = json_body(app(&state).oneshot(get("/admin/providers/new")).await?).await;
    assert_eq!(page["notices"][0]["level"], "error");
    assert_eq!(
        page["notices"][0]["message"],
        "Provider String should be base64 encoded string."
    );
    assert!(page["token"].is_string());
    Ok(())
}

#[tokio::test]
async fn forged_form_token_is_forbidden_and_mutates_nothing() -> Result<()> {
    let state = test_state().await?;

    let response = app(&state)
        .oneshot(post_form(
            "/admin/providers/new",
            &[
                ("zl_provider_string", provider_string("acme").as_str()),
                ("token", "00000000000000000000"),
            ],
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(state.registration.listing().await?.is_empty());

    // A token issued for another action is rejected too.
    let wrong_action = state.tokens.create(REVOKE_PROVIDER_ACTION);
    let response = app(&state)
        .oneshot(post_form(
            "/admin/providers/new",
            &[
                ("zl_provider_string", provider_string("acme").as_str()),
                ("token", wrong_action.as_str()),
            ],
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn non_form_body_is_a_validation_failure() -> Result<()> {
    let state = test_state().await?;

    let json_body_request = Request::builder()
        .method("POST")
        .uri("/admin/providers/new")
        .header(header::AUTHORIZATION, format!("Bearer {OPERATOR_TOKEN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"zl_provider_string":"abc"}"#))?;
    let response = app(&state).oneshot(json_body_request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "VALIDATION_FAILED");

    let token = state.tokens.create(ADD_PROVIDER_ACTION);
    let response = app(&state)
        .oneshot(post_form(
            "/admin/providers/new",
            &[("token", token.as_str()), ("token", token.as_str())],
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert!(body["message"].as_str().unwrap().starts_with("Invalid form"));

    assert!(state.registration.listing().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn revoke_link_deletes_provider() -> Result<()> {
    let state = test_state().await?;
    let model = state
        .registration
        .register(&provider_string("acme"))
        .await?;
    state.notices.take_all().await?;

    let token = state.tokens.create(REVOKE_PROVIDER_ACTION);
    let uri = format!(
        "/admin/providers?page=zl&action=revoke&license={}&token={}",
        model.id, token
    );
    let response = app(&state).oneshot(get(&uri)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/providers");

    let page = json_body(app(&state).oneshot(get("/admin/providers")).await?).await;
    assert!(page["providers"].as_array().unwrap().is_empty());
    assert_eq!(page["notices"][0]["message"], "Success revoked the provider");
    Ok(())
}

#[tokio::test]
async fn revoke_with_bad_token_is_forbidden() -> Result<()> {
    let state = test_state().await?;
    let model = state
        .registration
        .register(&provider_string("acme"))
        .await?;

    let uri = format!(
        "/admin/providers?action=revoke&license={}&token=forged",
        model.id
    );
    let response = app(&state).oneshot(get(&uri)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/problem+json"
    );
    assert_eq!(state.registration.listing().await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn revoke_of_unknown_id_reports_not_found() -> Result<()> {
    let state = test_state().await?;
    let token = state.tokens.create(REVOKE_PROVIDER_ACTION);

    let uri = format!("/admin/providers?action=revoke&license=99999&token={token}");
    let response = app(&state).oneshot(get(&uri)).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let page = json_body(app(&state).oneshot(get("/admin/providers")).await?).await;
    assert_eq!(page["notices"][0]["level"], "error");
    assert_eq!(page["notices"][0]["message"], "Provider not found");
    Ok(())
}

#[tokio::test]
async fn ajax_dispatches_and_rejects_unknown_call_types() -> Result<()> {
    let state = test_state().await?;
    let nonce = state.tokens.create(AJAX_ACTION);

    let response = app(&state)
        .oneshot(post_form(
            "/admin/ajax",
            &[
                ("call_type", "get_items_from_source"),
                ("nonce", nonce.as_str()),
                ("name", SYSTEM_SITE_NAME),
            ],
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["site"]["label"], "Melati [de.test]");

    let response = app(&state)
        .oneshot(post_form(
            "/admin/ajax",
            &[("call_type", "drop_everything"), ("nonce", nonce.as_str())],
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app(&state)
        .oneshot(post_form(
            "/admin/ajax",
            &[("call_type", "get_items_from_source"), ("nonce", "forged")],
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn license_page_and_auth() -> Result<()> {
    let state = test_state().await?;

    let page = json_body(app(&state).oneshot(get("/admin/licenses")).await?).await;
    assert_eq!(page["title"], "License");

    let unauthenticated = Request::builder()
        .uri("/admin/providers")
        .body(Body::empty())
        .unwrap();
    let response = app(&state).oneshot(unauthenticated).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn health_and_openapi_are_public() -> Result<()> {
    let state = test_state().await?;

    let response = app(&state)
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["database"], "up");

    let response = app(&state)
        .oneshot(Request::builder().uri("/openapi.json").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let doc = json_body(response).await;
    assert!(doc["paths"]["/admin/providers/new"].is_object());
    assert!(doc["paths"]["/admin/ajax"].is_object());
    Ok(())
}
