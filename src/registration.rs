//! Provider registration and revocation workflow.
//!
//! Registration takes the base64 provider string pasted by the operator,
//! validates it step by step, stores the provider and invalidates the cached
//! listing. Every outcome leaves exactly one notice for the next page render.

use std::time::Duration;

use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use metrics::counter;
use rand::{Rng, distributions::Alphanumeric};
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::cache::{Cache, PROVIDERS_KEY};
use crate::error::is_unique_violation;
use crate::models::provider;
use crate::notices::{NoticeLevel, NoticeStore};
use crate::repositories::{NewProvider, ProviderFilter, ProviderRepository};

const UID_LEN: usize = 5;

/// Why a registration attempt was rejected. `Display` is the notice text.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Provider String should be base64 encoded string.")]
    InvalidBase64,
    #[error("Zoro String should be json string. [1]")]
    NotText,
    #[error("Zoro String should be json string. [2]")]
    InvalidJson,
    #[error("Zoro String doesn't contain connection config")]
    MissingConfig,
    #[error("Provider {0} is already registered")]
    Duplicate(String),
    #[error("Failed to add the provider to database")]
    Storage(#[source] DbErr),
}

impl RegistrationError {
    fn outcome(&self) -> &'static str {
        match self {
            RegistrationError::InvalidBase64
            | RegistrationError::NotText
            | RegistrationError::InvalidJson
            | RegistrationError::MissingConfig => "invalid",
            RegistrationError::Duplicate(_) => "duplicate",
            RegistrationError::Storage(_) => "storage_error",
        }
    }
}

/// Why a revocation failed. `Display` is the notice text.
#[derive(Debug, Error)]
pub enum RevocationError {
    #[error("Provider not found")]
    NotFound(String),
    #[error("Failed to revoke the provider")]
    Storage(#[source] DbErr),
}

/// Connection config carried by a provider string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProviderPayload {
    pub api_key: String,
    pub api_secret: String,
    pub site_title: String,
    pub provider: String,
    pub namespace: String,
    pub version: String,
}

/// Standard alphabet, padding optional.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Decodes and validates a base64 provider string.
///
/// ASCII whitespace anywhere in the input is ignored, so wrapped strings decode.
pub fn decode_provider_string(input: &str) -> Result<ProviderPayload, RegistrationError> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = LENIENT_BASE64
        .decode(compact)
        .map_err(|_| RegistrationError::InvalidBase64)?;
    if bytes.is_empty() {
        return Err(RegistrationError::InvalidBase64);
    }

    let text = String::from_utf8(bytes).map_err(|_| RegistrationError::NotText)?;
    let value: Value = serde_json::from_str(&text).map_err(|_| RegistrationError::InvalidJson)?;

    let field = |name: &str| -> Result<String, RegistrationError> {
        match value.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            _ => Err(RegistrationError::MissingConfig),
        }
    };

    Ok(ProviderPayload {
        api_key: field("api_key")?,
        api_secret: field("api_secret")?,
        site_title: field("site_title")?,
        provider: field("provider")?,
        namespace: field("namespace")?,
        version: field("version")?,
    })
}

fn generate_uid() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(UID_LEN)
        .map(char::from)
        .collect()
}

/// Registration workflow over the credential store, the listing cache and the notices.
#[derive(Clone)]
pub struct ProviderRegistration {
    repo: ProviderRepository,
    cache: Cache,
    notices: NoticeStore,
    providers_ttl: Duration,
}

impl ProviderRegistration {
    pub fn new(
        repo: ProviderRepository,
        cache: Cache,
        notices: NoticeStore,
        providers_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            cache,
            notices,
            providers_ttl,
        }
    }

    /// Registers the provider described by `input`.
    pub async fn register(&self, input: &str) -> Result<provider::Model, RegistrationError> {
        match self.try_register(input).await {
            Ok(model) => {
                counter!("provider_registrations_total", "outcome" => "success").increment(1);
                info!(provider = %model.provider, id = model.id, "Provider registered");
                self.invalidate_listing().await;
                self.notify(NoticeLevel::Success, "Success added the provider to database")
                    .await;
                Ok(model)
            }
            Err(err) => {
                counter!("provider_registrations_total", "outcome" => err.outcome()).increment(1);
                match &err {
                    RegistrationError::Storage(source) => {
                        error!(error = %source, "Failed to store provider")
                    }
                    other => warn!(reason = %other, "Provider registration rejected"),
                }
                self.notify(NoticeLevel::Error, err.to_string()).await;
                Err(err)
            }
        }
    }

    async fn try_register(&self, input: &str) -> Result<provider::Model, RegistrationError> {
        let payload = decode_provider_string(input)?;
        let name = payload.provider.clone();

        self.repo
            .create(NewProvider {
                uid: generate_uid(),
                site_title: payload.site_title,
                provider: payload.provider,
                namespace: payload.namespace,
                version: payload.version,
                api_key: payload.api_key,
                api_secret: payload.api_secret,
            })
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    RegistrationError::Duplicate(name)
                } else {
                    RegistrationError::Storage(err)
                }
            })
    }

    /// Revokes the provider whose id is given as the `license` request value.
    pub async fn revoke_license(&self, license: &str) -> Result<(), RevocationError> {
        match license.trim().parse::<i64>() {
            Ok(id) => self.revoke(id).await,
            Err(_) => {
                let err = RevocationError::NotFound(license.to_string());
                self.report_revocation(&err).await;
                Err(err)
            }
        }
    }

    /// Deletes the provider with `id`.
    pub async fn revoke(&self, id: i64) -> Result<(), RevocationError> {
        let result = self.try_revoke(id).await;
        match &result {
            Ok(()) => {
                counter!("provider_revocations_total", "outcome" => "success").increment(1);
                info!(id, "Provider revoked");
                self.invalidate_listing().await;
                self.notify(NoticeLevel::Success, "Success revoked the provider")
                    .await;
            }
            Err(err) => self.report_revocation(err).await,
        }
        result
    }

    async fn try_revoke(&self, id: i64) -> Result<(), RevocationError> {
        let filter = ProviderFilter::Id(id);
        if self
            .repo
            .get(&filter)
            .await
            .map_err(RevocationError::Storage)?
            .is_none()
        {
            return Err(RevocationError::NotFound(id.to_string()));
        }

        let removed = self
            .repo
            .delete(&filter)
            .await
            .map_err(RevocationError::Storage)?;
        if removed == 0 {
            return Err(RevocationError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn report_revocation(&self, err: &RevocationError) {
        let outcome = match err {
            RevocationError::NotFound(id) => {
                warn!(id = %id, "Revocation of unknown provider");
                "not_found"
            }
            RevocationError::Storage(source) => {
                error!(error = %source, "Failed to revoke provider");
                "storage_error"
            }
        };
        counter!("provider_revocations_total", "outcome" => outcome).increment(1);
        self.notify(NoticeLevel::Error, err.to_string()).await;
    }

    /// Provider listing, cached for the configured ttl.
    pub async fn listing(&self) -> Result<Vec<provider::Model>, DbErr> {
        let repo = self.repo.clone();
        self.cache
            .remember(PROVIDERS_KEY, self.providers_ttl, || async move {
                repo.list_all().await
            })
            .await
    }

    /// Registered provider named `name`, looked up in the cached listing.
    pub async fn find_registered(&self, name: &str) -> Result<Option<provider::Model>, DbErr> {
        Ok(self
            .listing()
            .await?
            .into_iter()
            .find(|model| model.provider == name))
    }

    async fn invalidate_listing(&self) {
        if let Err(err) = self.cache.flush().await {
            error!(error = %err, "Failed to flush cache after provider change");
        }
    }

    async fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        if let Err(err) = self.notices.add(level, message).await {
            warn!(error = %err, "Failed to queue notice");
        }
    }
}
