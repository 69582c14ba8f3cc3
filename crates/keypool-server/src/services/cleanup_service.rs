//! Фоновая очистка: возврат в пул аккаунтов, выданных просроченным,
//! заблокированным или удалённым ключам.

use crate::error::AppError;
use crate::services::pool_service;
use crate::store::Store;
use chrono::Utc;
use keypool_entities::assignments::{AssignmentStatus, Column, Entity as AssignmentEntity};
use keypool_entities::keys::{Entity as KeyEntity, KeyStatus};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::time::Duration;

/// Запустить бесконечный цикл очистки с заданным периодом.
pub async fn run_cleanup_loop(store: Store, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;

        if let Err(e) = cleanup_once(&store).await {
            tracing::error!("Ошибка очистки пула аккаунтов: {e}");
        }
    }
}

/// Один проход очистки. Возвращает число закрытых назначений.
pub async fn cleanup_once(store: &Store) -> Result<u64, AppError> {
    let now = Utc::now();
    let txn = store.write().await?;

    let active = AssignmentEntity::find()
        .filter(Column::Status.eq(AssignmentStatus::Active))
        .all(txn.conn())
        .await?;

    let mut released = 0;
    for assignment in active {
        let key = KeyEntity::find_by_id(assignment.key_code.clone())
            .one(txn.conn())
            .await?;

        let reason = match &key {
            None => "ключ удалён",
            Some(k) if k.status == KeyStatus::Banned => "ключ заблокирован",
            Some(k) if k.is_expired(now) => "срок ключа истёк",
            Some(_) => continue,
        };

        tracing::info!(
            "Освобождаю аккаунт {} ключа {} ({reason})",
            assignment.account_id,
            assignment.key_code
        );
        pool_service::release(txn.conn(), &assignment.id, now).await?;
        released += 1;
    }

    txn.commit().await?;

    Ok(released)
}
