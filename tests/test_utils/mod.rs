//! Test utilities for database and router testing.
//!
//! Provides in-memory SQLite databases with migrations applied and a fully
//! wired application state backed by in-memory stores.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use base64::{Engine as _, engine::general_purpose};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use serde_json::json;
use zoro_lite::cache::{Cache, MemoryStore};
use zoro_lite::config::AppConfig;
use zoro_lite::dispatch::{SourceBackend, UnconfiguredBackend};
use zoro_lite::notices::NoticeStore;
use zoro_lite::registration::ProviderRegistration;
use zoro_lite::repositories::ProviderRepository;
use zoro_lite::server::{AppState, build_state_with};

pub const OPERATOR_TOKEN: &str = "test-operator-token";

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Sets up an in-memory SQLite database with all migrations applied and returns an Arc.
pub async fn setup_test_db_arc() -> Result<Arc<DatabaseConnection>> {
    let db = setup_test_db().await?;
    Ok(Arc::new(db))
}

/// Configuration accepted by `validate()` with a fixed action secret.
pub fn test_config() -> AppConfig {
    AppConfig {
        profile: "test".to_string(),
        operator_tokens: vec![OPERATOR_TOKEN.to_string()],
        action_secret: Some(vec![9u8; 32]),
        ..Default::default()
    }
}

/// Registration workflow over `db` with in-memory cache and notices.
pub fn registration(db: Arc<DatabaseConnection>, ttl: Duration) -> (ProviderRegistration, NoticeStore) {
    let notices = NoticeStore::in_memory(Duration::from_secs(60));
    let registration = ProviderRegistration::new(
        ProviderRepository::new(db),
        Cache::new(Arc::new(MemoryStore::default())),
        notices.clone(),
        ttl,
    );
    (registration, notices)
}

/// Application state over a migrated in-memory database.
pub async fn test_state() -> Result<AppState> {
    test_state_with_backend(Arc::new(UnconfiguredBackend)).await
}

pub async fn test_state_with_backend(backend: Arc<dyn SourceBackend>) -> Result<AppState> {
    test_state_with(test_config(), backend).await
}

pub async fn test_state_with(config: AppConfig, backend: Arc<dyn SourceBackend>) -> Result<AppState> {
    let db = setup_test_db().await?;
    build_state_with(
        Arc::new(config),
        db,
        Cache::new(Arc::new(MemoryStore::default())),
        backend,
    )
}

/// Base64 provider string for a provider named `provider`.
pub fn provider_string(provider: &str) -> String {
    let payload = json!({
        "api_key": format!("{provider}-key"),
        "api_secret": format!("{provider}-secret"),
        "site_title": format!("{provider} site"),
        "provider": provider,
        "namespace": "asura",
        "version": "1.0.0",
    });
    general_purpose::STANDARD.encode(payload.to_string())
}
