//! Database migrations for Zoro Lite.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_10_01_090000_create_zl_providers;
mod m2026_10_01_090100_create_zl_licenses;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_10_01_090000_create_zl_providers::Migration),
            Box::new(m2026_10_01_090100_create_zl_licenses::Migration),
        ]
    }
}
