//! # Call-Type Dispatcher
//!
//! Routes AJAX requests to a handler chosen by their `call_type` value. A
//! security check runs before anything else, unknown call types answer
//! `NOT_FOUND`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::action_token::{AJAX_ACTION, ActionTokens};
use crate::error::{ApiError, forbidden, not_found};

mod backend;
mod items;

pub use backend::{BackendError, HttpSourceBackend, SourceBackend, UnconfiguredBackend};
pub use items::ItemsFromSource;

/// Request parameter carrying the anti-forgery token.
pub const NONCE_PARAM: &str = "nonce";

/// Operations reachable through the AJAX endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    SetupDefaultData,
    GetComponentFromSource,
    GetPageFromSource,
    GetItemsFromSource,
    GetStuffFromSource,
}

impl CallType {
    pub const ALL: [CallType; 5] = [
        CallType::SetupDefaultData,
        CallType::GetComponentFromSource,
        CallType::GetPageFromSource,
        CallType::GetItemsFromSource,
        CallType::GetStuffFromSource,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::SetupDefaultData => "setup_default_data",
            CallType::GetComponentFromSource => "get_component_from_source",
            CallType::GetPageFromSource => "get_page_from_source",
            CallType::GetItemsFromSource => "get_items_from_source",
            CallType::GetStuffFromSource => "get_stuff_from_source",
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CallType::ALL
            .into_iter()
            .find(|call_type| call_type.as_str() == s)
            .ok_or_else(|| format!("unknown call type '{s}'"))
    }
}

/// An inbound AJAX call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallRequest {
    pub call_type: Option<String>,
    pub params: BTreeMap<String, String>,
}

impl CallRequest {
    /// Splits the submitted form into the call type and the remaining parameters.
    pub fn from_form(mut form: BTreeMap<String, String>) -> Self {
        let call_type = form.remove("call_type");
        Self {
            call_type,
            params: form,
        }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Parameters meant for the handler, without the anti-forgery token.
    pub fn handler_params(&self) -> BTreeMap<String, String> {
        self.params
            .iter()
            .filter(|(key, _)| key.as_str() != NONCE_PARAM)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// Implementation of a single call type.
#[async_trait]
pub trait CallHandler: Send + Sync {
    async fn handle(&self, call_type: CallType, request: &CallRequest) -> Result<Value, ApiError>;
}

/// Gate run for every call before its type is resolved.
pub trait SecurityCheck: Send + Sync {
    fn check(&self, request: &CallRequest) -> Result<(), ApiError>;
}

/// Requires a valid `ct_new_style_api_call` token in the `nonce` parameter.
#[derive(Debug, Clone)]
pub struct ActionTokenCheck {
    tokens: ActionTokens,
}

impl ActionTokenCheck {
    pub fn new(tokens: ActionTokens) -> Self {
        Self { tokens }
    }
}

impl SecurityCheck for ActionTokenCheck {
    fn check(&self, request: &CallRequest) -> Result<(), ApiError> {
        match request.param(NONCE_PARAM) {
            Some(nonce) if self.tokens.verify(AJAX_ACTION, nonce) => Ok(()),
            _ => Err(forbidden(Some("Invalid or missing nonce"))),
        }
    }
}

/// Hands the call to the companion backend unchanged.
pub struct Delegate {
    backend: Arc<dyn SourceBackend>,
}

impl Delegate {
    pub fn new(backend: Arc<dyn SourceBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl CallHandler for Delegate {
    async fn handle(&self, call_type: CallType, request: &CallRequest) -> Result<Value, ApiError> {
        Ok(self
            .backend
            .call(call_type, &request.handler_params())
            .await?)
    }
}

/// Maps call types to handlers behind a security check.
pub struct Dispatcher {
    security: Arc<dyn SecurityCheck>,
    handlers: HashMap<CallType, Arc<dyn CallHandler>>,
}

impl Dispatcher {
    pub fn new(security: Arc<dyn SecurityCheck>) -> Self {
        Self {
            security,
            handlers: HashMap::new(),
        }
    }

    /// Standard table: items are resolved locally, everything else is delegated.
    pub fn standard(
        security: Arc<dyn SecurityCheck>,
        backend: Arc<dyn SourceBackend>,
        items: ItemsFromSource,
    ) -> Self {
        let delegate: Arc<dyn CallHandler> = Arc::new(Delegate::new(backend));
        let mut dispatcher = Self::new(security);
        for call_type in CallType::ALL {
            dispatcher.register(call_type, delegate.clone());
        }
        dispatcher.register(CallType::GetItemsFromSource, Arc::new(items));
        dispatcher
    }

    pub fn register(&mut self, call_type: CallType, handler: Arc<dyn CallHandler>) {
        self.handlers.insert(call_type, handler);
    }

    pub fn with_handler(mut self, call_type: CallType, handler: Arc<dyn CallHandler>) -> Self {
        self.register(call_type, handler);
        self
    }

    pub async fn dispatch(&self, request: &CallRequest) -> Result<Value, ApiError> {
        self.security.check(request).inspect_err(|_| {
            warn!(call_type = ?request.call_type, "Rejected AJAX call failing the security check");
        })?;

        let Some(raw) = request.call_type.as_deref() else {
            return Err(not_found("Missing call_type"));
        };
        let (call_type, handler) = raw
            .parse::<CallType>()
            .ok()
            .and_then(|call_type| self.handlers.get(&call_type).map(|h| (call_type, h)))
            .ok_or_else(|| {
                debug!(call_type = raw, "No handler for call type");
                not_found(&format!("Unknown call_type '{raw}'"))
            })?;

        counter!("dispatch_calls_total", "call_type" => call_type.as_str()).increment(1);
        handler.handle(call_type, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct AllowAll;

    impl SecurityCheck for AllowAll {
        fn check(&self, _request: &CallRequest) -> Result<(), ApiError> {
            Ok(())
        }
    }

    struct DenyAll;

    impl SecurityCheck for DenyAll {
        fn check(&self, _request: &CallRequest) -> Result<(), ApiError> {
            Err(forbidden(None))
        }
    }

    #[derive(Default)]
    struct Recording {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CallHandler for Recording {
        async fn handle(
            &self,
            call_type: CallType,
            request: &CallRequest,
        ) -> Result<Value, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "call_type": call_type.as_str(), "params": request.handler_params() }))
        }
    }

    fn request(call_type: Option<&str>) -> CallRequest {
        let mut form = BTreeMap::new();
        if let Some(call_type) = call_type {
            form.insert("call_type".to_string(), call_type.to_string());
        }
        form.insert("nonce".to_string(), "n".to_string());
        form.insert("name".to_string(), "home".to_string());
        CallRequest::from_form(form)
    }

    #[test]
    fn call_type_parses_every_tag() {
        for call_type in CallType::ALL {
            assert_eq!(call_type.as_str().parse::<CallType>(), Ok(call_type));
        }
        assert!("ct_unknown".parse::<CallType>().is_err());
    }

    #[tokio::test]
    async fn routes_to_registered_handler() {
        let handler = Arc::new(Recording::default());
        let dispatcher = Dispatcher::new(Arc::new(AllowAll))
            .with_handler(CallType::GetPageFromSource, handler.clone());

        let value = dispatcher
            .dispatch(&request(Some("get_page_from_source")))
            .await
            .unwrap();

        assert_eq!(value["call_type"], "get_page_from_source");
        assert_eq!(value["params"], json!({ "name": "home" }));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_or_missing_call_type_is_not_found() {
        let handler = Arc::new(Recording::default());
        let dispatcher = Dispatcher::new(Arc::new(AllowAll))
            .with_handler(CallType::GetPageFromSource, handler.clone());

        let unknown = dispatcher.dispatch(&request(Some("drop_tables"))).await;
        assert_eq!(unknown.unwrap_err().status, StatusCode::NOT_FOUND);

        let unregistered = dispatcher
            .dispatch(&request(Some("setup_default_data")))
            .await;
        assert_eq!(unregistered.unwrap_err().status, StatusCode::NOT_FOUND);

        let missing = dispatcher.dispatch(&request(None)).await;
        assert_eq!(missing.unwrap_err().status, StatusCode::NOT_FOUND);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn security_check_runs_before_resolution() {
        let handler = Arc::new(Recording::default());
        let dispatcher = Dispatcher::new(Arc::new(DenyAll))
            .with_handler(CallType::GetPageFromSource, handler.clone());

        let denied = dispatcher
            .dispatch(&request(Some("get_page_from_source")))
            .await;
        assert_eq!(denied.unwrap_err().status, StatusCode::FORBIDDEN);

        let unknown = dispatcher.dispatch(&request(Some("nope"))).await;
        assert_eq!(unknown.unwrap_err().status, StatusCode::FORBIDDEN);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn action_token_check_verifies_nonce() {
        let tokens = ActionTokens::new(&[3u8; 32], Duration::from_secs(3600)).unwrap();
        let check = ActionTokenCheck::new(tokens.clone());

        let mut valid = request(Some("get_page_from_source"));
        valid
            .params
            .insert(NONCE_PARAM.to_string(), tokens.create(AJAX_ACTION));
        assert!(check.check(&valid).is_ok());

        let forged = request(Some("get_page_from_source"));
        assert_eq!(
            check.check(&forged).unwrap_err().status,
            StatusCode::FORBIDDEN
        );
    }
}
