//! Миграция: создание таблицы keys.

use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_create_keys"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Keys::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Keys::Code).string().not_null().primary_key())
                    .col(ColumnDef::new(Keys::Mode).string().not_null())
                    .col(
                        ColumnDef::new(Keys::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(Keys::DeviceId).string().null())
                    .col(ColumnDef::new(Keys::ValidityDays).integer().null())
                    .col(ColumnDef::new(Keys::SwitchTotal).integer().null())
                    .col(
                        ColumnDef::new(Keys::SwitchUsed)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Keys::ActivatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Keys::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Keys::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Keys::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Keys {
    Table,
    Code,
    Mode,
    Status,
    DeviceId,
    ValidityDays,
    SwitchTotal,
    SwitchUsed,
    ActivatedAt,
    ExpiresAt,
    CreatedAt,
}
