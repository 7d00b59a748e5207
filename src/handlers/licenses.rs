//! License page handler.

use axum::response::Json;

use crate::handlers::types::LicensePage;

/// License page placeholder
#[utoipa::path(
    get,
    path = "/admin/licenses",
    responses(
        (status = 200, description = "License page", body = LicensePage),
        (status = 401, description = "Missing or invalid operator token", body = crate::error::ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn license_page() -> Json<LicensePage> {
    Json(LicensePage {
        title: "License".to_string(),
    })
}
