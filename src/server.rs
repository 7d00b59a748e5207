//! # Server Configuration
//!
//! Application state, router and server startup for Zoro Lite.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::action_token::ActionTokens;
use crate::auth::auth_middleware;
use crate::cache::{Cache, FileStore};
use crate::config::AppConfig;
use crate::dispatch::{
    ActionTokenCheck, Dispatcher, HttpSourceBackend, ItemsFromSource, SourceBackend,
    UnconfiguredBackend,
};
use crate::handlers;
use crate::notices::NoticeStore;
use crate::registration::ProviderRegistration;
use crate::repositories::ProviderRepository;
use crate::sources::SourceSites;
use crate::telemetry::trace_context_middleware;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub registration: ProviderRegistration,
    pub notices: NoticeStore,
    pub tokens: ActionTokens,
    pub dispatcher: Arc<Dispatcher>,
}

/// Builds the application state with the configured cache directory and source backend.
pub fn build_state(config: Arc<AppConfig>, db: DatabaseConnection) -> anyhow::Result<AppState> {
    let cache = Cache::new(Arc::new(FileStore::new(config.cache_dir.clone())));
    let backend: Arc<dyn SourceBackend> = match config.source_backend_url {
        Some(ref url) => Arc::new(
            HttpSourceBackend::new(url.clone()).context("Failed to build source backend client")?,
        ),
        None => {
            tracing::warn!("No source backend configured; delegated call types will answer 503");
            Arc::new(UnconfiguredBackend)
        }
    };
    build_state_with(config, db, cache, backend)
}

/// Builds the application state around the given cache and source backend.
pub fn build_state_with(
    config: Arc<AppConfig>,
    db: DatabaseConnection,
    cache: Cache,
    backend: Arc<dyn SourceBackend>,
) -> anyhow::Result<AppState> {
    let lifetime = std::time::Duration::from_secs(config.action_token_lifetime_seconds);
    let tokens = match config.action_secret {
        Some(ref secret) => ActionTokens::new(secret, lifetime)?,
        None => {
            tracing::warn!("No action secret configured; using a per-process secret");
            ActionTokens::ephemeral(lifetime)?
        }
    };

    let notices = NoticeStore::in_memory(config.notice_ttl());
    let registration = ProviderRegistration::new(
        ProviderRepository::new(Arc::new(db.clone())),
        cache,
        notices.clone(),
        config.providers_cache_ttl(),
    );

    let sites = Arc::new(SourceSites::with_defaults(&config.source_sites));
    let items = ItemsFromSource::new(sites, registration.clone(), backend.clone());
    let dispatcher = Dispatcher::standard(
        Arc::new(ActionTokenCheck::new(tokens.clone())),
        backend,
        items,
    );

    Ok(AppState {
        config,
        db,
        registration,
        notices,
        tokens,
        dispatcher: Arc::new(dispatcher),
    })
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    let admin = Router::new()
        .route("/admin/providers", get(handlers::providers::providers_page))
        .route(
            "/admin/providers/new",
            get(handlers::providers::new_provider_page).post(handlers::providers::add_provider),
        )
        .route("/admin/licenses", get(handlers::licenses::license_page))
        .route("/admin/ajax", post(handlers::ajax::ajax_call))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.config),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(admin)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_context_middleware))
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig, db: DatabaseConnection) -> anyhow::Result<()> {
    let addr = config.bind_addr().context("Invalid server address")?;
    let state = build_state(Arc::new(config), db)?;
    let profile = state.config.profile.clone();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, %profile, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health,
        crate::handlers::providers::providers_page,
        crate::handlers::providers::new_provider_page,
        crate::handlers::providers::add_provider,
        crate::handlers::licenses::license_page,
        crate::handlers::ajax::ajax_call,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::error::ApiError,
            crate::error::BackendErrorDetails,
            crate::notices::Notice,
            crate::notices::NoticeLevel,
            crate::dispatch::CallType,
            crate::handlers::types::HealthResponse,
            crate::handlers::types::ProviderView,
            crate::handlers::types::ProvidersPage,
            crate::handlers::types::PageTokens,
            crate::handlers::types::NewProviderPage,
            crate::handlers::types::LicensePage,
            crate::handlers::providers::AddProviderForm,
        )
    ),
    info(
        title = "Zoro Lite Admin API",
        description = "Provider credential registration and source call dispatch",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
