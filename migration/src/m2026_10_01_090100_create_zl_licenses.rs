//! Migration to create the zl_licenses table.
//!
//! No code path reads or writes licenses yet; the table is declared so the
//! schema matches what the admin pages link to.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ZlLicenses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ZlLicenses::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ZlLicenses::Uid).string_len(255).not_null())
                    .col(ColumnDef::new(ZlLicenses::Provider).string_len(255).not_null())
                    .col(ColumnDef::new(ZlLicenses::License).string_len(255).not_null())
                    .col(ColumnDef::new(ZlLicenses::Hash).string_len(255).not_null())
                    .col(
                        ColumnDef::new(ZlLicenses::Status)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(ZlLicenses::CreatedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(ZlLicenses::UpdatedAt).timestamp_with_time_zone().null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ZlLicenses::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ZlLicenses {
    Table,
    Id,
    Uid,
    Provider,
    License,
    Hash,
    Status,
    CreatedAt,
    UpdatedAt,
}
