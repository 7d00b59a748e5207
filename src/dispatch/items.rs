//! Local handler for `get_items_from_source`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;
use utoipa::ToSchema;

use crate::error::{ApiError, not_found, validation_error};
use crate::models::provider;
use crate::registration::ProviderRegistration;
use crate::sources::{SOURCE_PREFIX, SourceIdentifier, SourceSite, SourceSites};

use super::{CallHandler, CallRequest, CallType, SourceBackend};

/// Source site as exposed to AJAX callers, without its access key.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SiteView {
    pub name: String,
    pub label: String,
    pub url: String,
    pub system: bool,
}

impl SiteView {
    fn new(name: &str, site: &SourceSite) -> Self {
        Self {
            name: name.to_string(),
            label: site.label.clone(),
            url: site.url.clone(),
            system: site.system,
        }
    }
}

/// Registered provider without its credentials.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegistrationView {
    pub id: i64,
    pub uid: String,
    pub site_title: String,
    pub provider: String,
    pub namespace: String,
    pub version: String,
    pub status: bool,
}

impl From<provider::Model> for RegistrationView {
    fn from(model: provider::Model) -> Self {
        Self {
            id: model.id,
            uid: model.uid,
            site_title: model.site_title,
            provider: model.provider,
            namespace: model.namespace,
            version: model.version,
            status: model.status,
        }
    }
}

/// Resolved design-set source.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResolvedSource {
    pub provider: String,
    pub license: String,
    pub slug: String,
    pub site: Option<SiteView>,
    pub registration: Option<RegistrationView>,
}

/// Resolves `tla_` names against the source sites and the registered
/// providers. Other names go to the companion backend.
pub struct ItemsFromSource {
    sites: Arc<SourceSites>,
    registration: ProviderRegistration,
    backend: Arc<dyn SourceBackend>,
}

impl ItemsFromSource {
    pub fn new(
        sites: Arc<SourceSites>,
        registration: ProviderRegistration,
        backend: Arc<dyn SourceBackend>,
    ) -> Self {
        Self {
            sites,
            registration,
            backend,
        }
    }

    async fn resolve(&self, name: &str) -> Result<ResolvedSource, ApiError> {
        let identifier = SourceIdentifier::parse(name).map_err(|err| {
            validation_error(&err.to_string(), json!({ "name": name }))
        })?;

        let site = self.sites.get(name).map(|site| SiteView::new(name, site));
        let registration = self
            .registration
            .find_registered(&identifier.provider)
            .await?
            .map(RegistrationView::from);

        if site.is_none() && registration.is_none() {
            return Err(not_found(&format!("Source '{name}' is not known")));
        }

        Ok(ResolvedSource {
            provider: identifier.provider,
            license: identifier.license,
            slug: identifier.slug,
            site,
            registration,
        })
    }
}

#[async_trait]
impl CallHandler for ItemsFromSource {
    async fn handle(&self, call_type: CallType, request: &CallRequest) -> Result<Value, ApiError> {
        let name = match request.param("name").map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(validation_error(
                    "Missing required parameter 'name'",
                    json!({ "name": "Required parameter is missing" }),
                ));
            }
        };

        if !name.starts_with(SOURCE_PREFIX) {
            debug!(name, "Delegating non design-set source");
            return Ok(self
                .backend
                .call(call_type, &request.handler_params())
                .await?);
        }

        let resolved = self.resolve(name).await?;
        serde_json::to_value(resolved).map_err(|err| ApiError::from(anyhow::Error::from(err)))
    }
}
