//! Миграция: создание таблицы assignments.

use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m003_create_assignments"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Assignments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Assignments::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Assignments::KeyCode).string().not_null())
                    .col(ColumnDef::new(Assignments::AccountId).string().not_null())
                    .col(ColumnDef::new(Assignments::DeviceId).string().not_null())
                    .col(
                        ColumnDef::new(Assignments::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(Assignments::AssignedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Assignments::ReleasedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Поиск активного назначения по ключу
        manager
            .create_index(
                Index::create()
                    .table(Assignments::Table)
                    .col(Assignments::KeyCode)
                    .col(Assignments::Status)
                    .name("idx_assignments_key_status")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Assignments::Table)
                    .col(Assignments::AccountId)
                    .name("idx_assignments_account_id")
                    .to_owned(),
            )
            .await?;

        // Не больше одного активного назначения на ключ и на аккаунт.
        // Частичные индексы одинаково поддерживают SQLite и Postgres.
        let db = manager.get_connection();
        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_assignments_active_key \
             ON assignments (key_code) WHERE status = 'active'",
        )
        .await?;
        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_assignments_active_account \
             ON assignments (account_id) WHERE status = 'active'",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Assignments::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Assignments {
    Table,
    Id,
    KeyCode,
    AccountId,
    DeviceId,
    Status,
    AssignedAt,
    ReleasedAt,
}
