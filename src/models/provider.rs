//! Provider entity model
//!
//! This module contains the SeaORM entity model for the `zl_providers` table,
//! which stores the registered provider credential sets.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};

/// Registered provider credentials
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "zl_providers")]
pub struct Model {
    /// Auto-incrementing identifier, used by revocation links
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Short random identifier
    pub uid: String,

    /// Display label of the site the credentials belong to
    pub site_title: String,

    /// Provider name, unique across the table
    #[sea_orm(unique)]
    pub provider: String,

    pub namespace: String,

    pub version: String,

    pub api_key: String,

    pub api_secret: String,

    /// Declared for future use; always true today
    pub status: bool,

    pub created_at: Option<DateTimeWithTimeZone>,

    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
