//! Хранилище: соединение с БД и глобальная блокировка записи.
//!
//! Все изменяющие операции проходят через [`Store::write`]: блокировка
//! удерживается до фиксации транзакции, поэтому последовательности
//! «прочитать, проверить, записать» для ключей и аккаунтов не пересекаются.
//!
//! Блокировка двухуровневая. Внутри процесса писатели ждут мьютекс. Между
//! процессами первой командой транзакции обновляется строка `store_lock`:
//! в Postgres это блокировка строки до фиксации, в SQLite захват записи в
//! начале транзакции (ожидание по busy_timeout соединения, 5 с у sqlx).

use chrono::Utc;
use keypool_entities::store_lock::{self, WRITE_LOCK_ROW};
use keypool_migration::{Migrator, MigratorTrait};
use sea_orm::{
    ActiveModelTrait,
    ActiveValue::{Set, Unchanged},
    ConnectOptions, Database, DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait,
};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

#[derive(Clone)]
pub struct Store {
    db: DatabaseConnection,
    write_lock: Arc<Mutex<()>>,
}

impl Store {
    /// Подключиться к БД и применить миграции.
    pub async fn connect<C: Into<ConnectOptions>>(options: C) -> Result<Self, DbErr> {
        let options: ConnectOptions = options.into();
        info!("Подключение к базе данных: {}", options.get_url());
        let db = Database::connect(options).await?;

        info!("Выполнение миграций...");
        Migrator::up(&db, None).await?;

        Ok(Self::new(db))
    }

    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Соединение для операций только на чтение.
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Захватить блокировку записи и открыть транзакцию.
    pub async fn write(&self) -> Result<WriteTxn, DbErr> {
        let guard = self.write_lock.clone().lock_owned().await;
        let txn = self.db.begin().await?;

        store_lock::ActiveModel {
            id: Unchanged(WRITE_LOCK_ROW),
            acquired_at: Set(Some(Utc::now())),
        }
        .update(&txn)
        .await?;

        Ok(WriteTxn { txn, _guard: guard })
    }
}

/// Транзакция под блокировкой записи. Без `commit` изменения откатываются.
pub struct WriteTxn {
    txn: DatabaseTransaction,
    _guard: OwnedMutexGuard<()>,
}

impl WriteTxn {
    pub fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    pub async fn commit(self) -> Result<(), DbErr> {
        self.txn.commit().await
    }
}
