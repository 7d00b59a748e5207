//! Provider repository for database operations
//!
//! This module provides the ProviderRepository struct which encapsulates
//! SeaORM operations for the `zl_providers` table.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;

use crate::models::provider::{self, Entity as Provider};

/// Equality filter over a single provider column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderFilter {
    Id(i64),
    Provider(String),
}

impl ProviderFilter {
    fn condition(&self) -> sea_orm::Condition {
        match self {
            ProviderFilter::Id(id) => sea_orm::Condition::all().add(provider::Column::Id.eq(*id)),
            ProviderFilter::Provider(name) => {
                sea_orm::Condition::all().add(provider::Column::Provider.eq(name.as_str()))
            }
        }
    }
}

/// Validated fields of a provider about to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProvider {
    pub uid: String,
    pub site_title: String,
    pub provider: String,
    pub namespace: String,
    pub version: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Repository for provider database operations
#[derive(Debug, Clone)]
pub struct ProviderRepository {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
}

impl ProviderRepository {
    /// Creates a new ProviderRepository instance
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Returns every stored provider, oldest first
    pub async fn list_all(&self) -> Result<Vec<provider::Model>, DbErr> {
        Provider::find()
            .order_by_asc(provider::Column::Id)
            .all(&*self.db)
            .await
    }

    /// Returns the single provider matching `filter`, if any
    pub async fn get(&self, filter: &ProviderFilter) -> Result<Option<provider::Model>, DbErr> {
        Provider::find()
            .filter(filter.condition())
            .one(&*self.db)
            .await
    }

    /// Inserts a new provider and returns the stored row
    ///
    /// A second provider with the same `provider` value fails with the
    /// backend's unique-violation error, see [`crate::error::is_unique_violation`].
    pub async fn create(&self, new: NewProvider) -> Result<provider::Model, DbErr> {
        let now = Utc::now().fixed_offset();

        let model = provider::ActiveModel {
            uid: Set(new.uid),
            site_title: Set(new.site_title),
            provider: Set(new.provider),
            namespace: Set(new.namespace),
            version: Set(new.version),
            api_key: Set(new.api_key),
            api_secret: Set(new.api_secret),
            status: Set(true),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        };

        model.insert(&*self.db).await
    }

    /// Deletes every provider matching `filter`, returning the number of rows removed
    pub async fn delete(&self, filter: &ProviderFilter) -> Result<u64, DbErr> {
        let result = Provider::delete_many()
            .filter(filter.condition())
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected)
    }
}
