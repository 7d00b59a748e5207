//! Migration to create the zl_providers table.
//!
//! Each row holds one registered provider credential set. The `provider`
//! column carries a unique index so concurrent registrations of the same
//! provider cannot both commit.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ZlProviders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ZlProviders::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ZlProviders::Uid).string_len(255).not_null())
                    .col(
                        ColumnDef::new(ZlProviders::SiteTitle)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ZlProviders::Provider)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ZlProviders::Namespace)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ZlProviders::Version)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ZlProviders::ApiKey).string_len(255).not_null())
                    .col(
                        ColumnDef::new(ZlProviders::ApiSecret)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ZlProviders::Status)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(ZlProviders::CreatedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(ZlProviders::UpdatedAt).timestamp_with_time_zone().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_zl_providers_provider")
                    .table(ZlProviders::Table)
                    .col(ZlProviders::Provider)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_zl_providers_provider").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(ZlProviders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ZlProviders {
    Table,
    Id,
    Uid,
    SiteTitle,
    Provider,
    Namespace,
    Version,
    ApiKey,
    ApiSecret,
    Status,
    CreatedAt,
    UpdatedAt,
}
