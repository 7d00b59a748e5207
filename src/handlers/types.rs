//! # Common API Types
//!
//! Response documents returned by the admin pages.

use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::provider;
use crate::notices::Notice;

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Overall service status ("ok" or "degraded")
    pub status: String,
    /// Database connectivity ("up" or "down")
    pub database: String,
}

/// A registered provider as listed on the providers page
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderView {
    pub id: i64,
    pub uid: String,
    pub site_title: String,
    pub provider: String,
    pub namespace: String,
    pub version: String,
    pub api_key: String,
    pub api_secret: String,
    pub status: bool,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub created_at: Option<DateTimeWithTimeZone>,
}

impl From<provider::Model> for ProviderView {
    fn from(model: provider::Model) -> Self {
        Self {
            id: model.id,
            uid: model.uid,
            site_title: model.site_title,
            provider: model.provider,
            namespace: model.namespace,
            version: model.version,
            api_key: model.api_key,
            api_secret: model.api_secret,
            status: model.status,
            created_at: model.created_at,
        }
    }
}

/// Action tokens for the links and calls issued from the providers page
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PageTokens {
    /// Token for revocation links
    pub revoke: String,
    /// Nonce for AJAX calls
    pub ajax: String,
}

/// Providers listing page
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProvidersPage {
    pub providers: Vec<ProviderView>,
    /// Notices pending since the last render, shown once
    pub notices: Vec<Notice>,
    pub tokens: PageTokens,
}

/// Add-provider page
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewProviderPage {
    pub notices: Vec<Notice>,
    /// Token to submit with the add-provider form
    pub token: String,
}

/// License page
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LicensePage {
    pub title: String,
}
