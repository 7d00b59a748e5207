//! # Provider Admin Handlers
//!
//! Listing, revocation and registration of providers. Mutating requests
//! answer with a `303 See Other` redirect; the outcome is reported as a
//! notice on the next page render.

use axum::{
    extract::{
        Form, Query, State,
        rejection::{FormRejection, QueryRejection},
    },
    response::{IntoResponse, Json, Redirect, Response},
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::action_token::{ADD_PROVIDER_ACTION, AJAX_ACTION, REVOKE_PROVIDER_ACTION};
use crate::error::{ApiError, forbidden};
use crate::handlers::types::{NewProviderPage, PageTokens, ProviderView, ProvidersPage};
use crate::notices::Notice;
use crate::server::AppState;

/// Route of the providers listing page.
pub const PROVIDERS_PATH: &str = "/admin/providers";
/// Route of the add-provider page.
pub const NEW_PROVIDER_PATH: &str = "/admin/providers/new";

/// Query parameters of the providers page
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ProvidersQuery {
    /// Admin page slug, always `zl`
    pub page: Option<String>,
    /// `revoke` to delete the provider given by `license`
    pub action: Option<String>,
    /// Id of the provider to revoke
    pub license: Option<String>,
    /// Revocation token
    pub token: Option<String>,
}

/// Add-provider form
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddProviderForm {
    /// Base64 encoded provider JSON
    #[serde(default)]
    pub zl_provider_string: String,
    /// Token issued by the add-provider page
    #[serde(default)]
    pub token: String,
}

async fn take_notices(state: &AppState) -> Result<Vec<Notice>, ApiError> {
    state
        .notices
        .take_all()
        .await
        .map_err(|err| ApiError::from(anyhow::Error::from(err)))
}

/// Providers listing, or revocation when `action=revoke`
#[utoipa::path(
    get,
    path = "/admin/providers",
    params(ProvidersQuery),
    responses(
        (status = 200, description = "Registered providers and pending notices", body = ProvidersPage),
        (status = 303, description = "Revocation handled, redirect to the listing"),
        (status = 401, description = "Missing or invalid operator token", body = ApiError),
        (status = 403, description = "Invalid revocation token", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn providers_page(
    State(state): State<AppState>,
    query: Result<Query<ProvidersQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;

    if query.action.as_deref() == Some("revoke") {
        let token = query.token.as_deref().unwrap_or_default();
        if !state.tokens.verify(REVOKE_PROVIDER_ACTION, token) {
            tracing::warn!("Rejected revocation with invalid token");
            return Err(forbidden(Some("Invalid revocation token")));
        }

        // Outcome is reported through the notice queue.
        let _ = state
            .registration
            .revoke_license(query.license.as_deref().unwrap_or_default())
            .await;
        return Ok(Redirect::to(PROVIDERS_PATH).into_response());
    }

    let providers = state
        .registration
        .listing()
        .await?
        .into_iter()
        .map(ProviderView::from)
        .collect();

    let page = ProvidersPage {
        providers,
        notices: take_notices(&state).await?,
        tokens: PageTokens {
            revoke: state.tokens.create(REVOKE_PROVIDER_ACTION),
            ajax: state.tokens.create(AJAX_ACTION),
        },
    };

    Ok(Json(page).into_response())
}

/// Add-provider page
#[utoipa::path(
    get,
    path = "/admin/providers/new",
    responses(
        (status = 200, description = "Pending notices and the form token", body = NewProviderPage),
        (status = 401, description = "Missing or invalid operator token", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn new_provider_page(
    State(state): State<AppState>,
) -> Result<Json<NewProviderPage>, ApiError> {
    Ok(Json(NewProviderPage {
        notices: take_notices(&state).await?,
        token: state.tokens.create(ADD_PROVIDER_ACTION),
    }))
}

/// Registers a provider from its base64 provider string
#[utoipa::path(
    post,
    path = "/admin/providers/new",
    request_body(content = AddProviderForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Redirect to the listing on success or back to the form on error"),
        (status = 400, description = "Malformed form body", body = ApiError),
        (status = 401, description = "Missing or invalid operator token", body = ApiError),
        (status = 403, description = "Invalid form token", body = ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn add_provider(
    State(state): State<AppState>,
    form: Result<Form<AddProviderForm>, FormRejection>,
) -> Result<Redirect, ApiError> {
    let Form(form) = form?;

    if !state.tokens.verify(ADD_PROVIDER_ACTION, &form.token) {
        tracing::warn!("Rejected provider registration with invalid token");
        return Err(forbidden(Some("Invalid form token")));
    }

    match state.registration.register(&form.zl_provider_string).await {
        Ok(_) => Ok(Redirect::to(PROVIDERS_PATH)),
        Err(_) => Ok(Redirect::to(NEW_PROVIDER_PATH)),
    }
}
