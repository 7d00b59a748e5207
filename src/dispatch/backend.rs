//! Companion backend answering the delegated call types.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{ApiError, ErrorType, backend_error};

use super::CallType;

/// Failure talking to the companion backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no source backend is configured")]
    Unconfigured,
    #[error("source backend request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("source backend returned status {status} for {call_type}")]
    Status {
        call_type: CallType,
        status: u16,
        body: Option<String>,
    },
    #[error("source backend returned an invalid JSON body: {0}")]
    InvalidBody(#[source] reqwest::Error),
}

impl From<BackendError> for ApiError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::Unconfigured => {
                ErrorType::ServiceUnavailable.with_message("Source backend is not configured")
            }
            BackendError::Status {
                call_type,
                status,
                body,
            } => backend_error(call_type.as_str(), status, body),
            other => {
                warn!(error = %other, "Source backend call failed");
                ErrorType::BadGateway.with_message("Source backend request failed")
            }
        }
    }
}

/// Executes call types this service does not implement itself.
#[async_trait]
pub trait SourceBackend: Send + Sync {
    async fn call(
        &self,
        call_type: CallType,
        params: &BTreeMap<String, String>,
    ) -> Result<Value, BackendError>;
}

/// Backend used when no endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredBackend;

#[async_trait]
impl SourceBackend for UnconfiguredBackend {
    async fn call(
        &self,
        _call_type: CallType,
        _params: &BTreeMap<String, String>,
    ) -> Result<Value, BackendError> {
        Err(BackendError::Unconfigured)
    }
}

/// Forwards calls as form posts to an HTTP endpoint and relays the JSON answer.
#[derive(Debug, Clone)]
pub struct HttpSourceBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSourceBackend {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(BackendError::Transport)?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl SourceBackend for HttpSourceBackend {
    async fn call(
        &self,
        call_type: CallType,
        params: &BTreeMap<String, String>,
    ) -> Result<Value, BackendError> {
        let mut form: Vec<(&str, &str)> = vec![("call_type", call_type.as_str())];
        form.extend(
            params
                .iter()
                .filter(|(key, _)| key.as_str() != "call_type")
                .map(|(key, value)| (key.as_str(), value.as_str())),
        );

        debug!(call_type = %call_type, endpoint = %self.endpoint, "Forwarding call to source backend");
        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(BackendError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok();
            return Err(BackendError::Status {
                call_type,
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(BackendError::InvalidBody)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn relays_json_from_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ajax"))
            .and(body_string_contains("call_type=get_page_from_source"))
            .and(body_string_contains("name=home"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"page": "home"})))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpSourceBackend::new(format!("{}/ajax", server.uri())).unwrap();
        let value = backend
            .call(CallType::GetPageFromSource, &params(&[("name", "home")]))
            .await
            .unwrap();

        assert_eq!(value, json!({"page": "home"}));
    }

    #[tokio::test]
    async fn non_success_status_maps_to_bad_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let backend = HttpSourceBackend::new(server.uri()).unwrap();
        let err = backend
            .call(CallType::SetupDefaultData, &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 500, .. }));

        let api_error = ApiError::from(err);
        assert_eq!(api_error.status, StatusCode::BAD_GATEWAY);
        let details = api_error.details.unwrap();
        assert_eq!(details["call_type"], "setup_default_data");
        assert_eq!(details["body_snippet"], "upstream exploded");
    }

    #[tokio::test]
    async fn unconfigured_backend_is_unavailable() {
        let err = UnconfiguredBackend
            .call(CallType::GetStuffFromSource, &BTreeMap::new())
            .await
            .unwrap_err();
        assert_eq!(ApiError::from(err).status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
