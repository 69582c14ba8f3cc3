//! Миграции схемы хранилища ключей и пула аккаунтов.

pub use sea_orm_migration::prelude::*;

mod m001_create_keys;
mod m002_create_accounts;
mod m003_create_assignments;
mod m004_create_store_lock;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m001_create_keys::Migration),
            Box::new(m002_create_accounts::Migration),
            Box::new(m003_create_assignments::Migration),
            Box::new(m004_create_store_lock::Migration),
        ]
    }
}
