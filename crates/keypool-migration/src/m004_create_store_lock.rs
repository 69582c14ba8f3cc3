//! Миграция: таблица store_lock с единственной строкой блокировки записи.

use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m004_create_store_lock"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StoreLock::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StoreLock::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(StoreLock::AcquiredAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        let insert = Query::insert()
            .into_table(StoreLock::Table)
            .columns([StoreLock::Id])
            .values_panic([1.into()])
            .to_owned();
        manager.exec_stmt(insert).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StoreLock::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum StoreLock {
    Table,
    Id,
    AcquiredAt,
}
