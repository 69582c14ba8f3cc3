//! Пул аккаунтов: выдача свободного аккаунта ключу, переключение, освобождение.
//!
//! Функции принимают любое соединение (`ConnectionTrait`), изменяющие
//! вызываются только внутри [`crate::store::WriteTxn`]. Инвариант: у ключа не
//! больше одного активного назначения, аккаунт в статусе `in_use` ровно тогда,
//! когда на него ссылается ровно одно активное назначение.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use keypool_entities::accounts::{self, AccountStatus, Entity as AccountEntity};
use keypool_entities::assignments::{self, AssignmentStatus, Entity as AssignmentEntity};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Активное назначение вместе с выданным аккаунтом.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub assignment: assignments::Model,
    pub account: accounts::Model,
}

/// Найти активное назначение ключа.
pub async fn active_assignment<C: ConnectionTrait>(
    conn: &C,
    key_code: &str,
) -> Result<Option<assignments::Model>, AppError> {
    let assignment = AssignmentEntity::find()
        .filter(assignments::Column::KeyCode.eq(key_code))
        .filter(assignments::Column::Status.eq(AssignmentStatus::Active))
        .one(conn)
        .await?;
    Ok(assignment)
}

/// Текущий аккаунт ключа, если он выдан.
pub async fn current_assignment<C: ConnectionTrait>(
    conn: &C,
    key_code: &str,
) -> Result<Option<Allocation>, AppError> {
    let Some(assignment) = active_assignment(conn, key_code).await? else {
        return Ok(None);
    };

    let account = AccountEntity::find_by_id(assignment.account_id.clone())
        .one(conn)
        .await?;

    Ok(account.map(|account| Allocation {
        assignment,
        account,
    }))
}

/// Вернуть уже выданный ключу аккаунт или выдать свободный.
pub async fn assign_or_reuse<C: ConnectionTrait>(
    conn: &C,
    key_code: &str,
    device_id: &str,
    now: DateTime<Utc>,
) -> Result<Allocation, AppError> {
    if let Some(existing) = active_assignment(conn, key_code).await? {
        match AccountEntity::find_by_id(existing.account_id.clone())
            .one(conn)
            .await?
        {
            Some(account) => {
                debug!("Ключ {key_code}: повторно используется аккаунт {}", account.login);
                return Ok(Allocation {
                    assignment: existing,
                    account,
                });
            }
            None => {
                // Назначение ссылается на несуществующий аккаунт
                warn!(
                    "Ключ {key_code}: аккаунт {} не найден, назначение {} закрывается",
                    existing.account_id, existing.id
                );
                mark_released(conn, existing, now).await?;
            }
        }
    }

    let account = pick_idle(conn).await?.ok_or(AppError::PoolExhausted)?;

    let assignment = assignments::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        key_code: Set(key_code.to_string()),
        account_id: Set(account.id.clone()),
        device_id: Set(device_id.to_string()),
        status: Set(AssignmentStatus::Active),
        assigned_at: Set(now),
        released_at: Set(None),
    }
    .insert(conn)
    .await?;

    let mut model: accounts::ActiveModel = account.into();
    model.status = Set(AccountStatus::InUse);
    model.current_key_code = Set(Some(key_code.to_string()));
    model.last_assigned_at = Set(Some(now));
    let account = model.update(conn).await?;

    info!("Ключ {key_code}: выдан аккаунт {} ({device_id})", account.login);

    Ok(Allocation {
        assignment,
        account,
    })
}

/// Освободить текущий аккаунт ключа и выдать следующий.
///
/// Лимиты переключений здесь не проверяются, это делает реестр ключей.
pub async fn switch_account<C: ConnectionTrait>(
    conn: &C,
    key_code: &str,
    device_id: &str,
    now: DateTime<Utc>,
) -> Result<Allocation, AppError> {
    release_for_key(conn, key_code, now).await?;
    assign_or_reuse(conn, key_code, device_id, now).await
}

/// Закрыть назначение и вернуть аккаунт в пул. Повторный вызов и
/// неизвестный `assignment_id` ничего не меняют.
pub async fn release<C: ConnectionTrait>(
    conn: &C,
    assignment_id: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let Some(assignment) = AssignmentEntity::find_by_id(assignment_id.to_string())
        .one(conn)
        .await?
    else {
        debug!("Назначение {assignment_id} не найдено, освобождать нечего");
        return Ok(());
    };

    if assignment.status == AssignmentStatus::Released {
        return Ok(());
    }

    let account_id = assignment.account_id.clone();
    let key_code = assignment.key_code.clone();
    mark_released(conn, assignment, now).await?;

    if let Some(account) = AccountEntity::find_by_id(account_id).one(conn).await? {
        let login = account.login.clone();
        let mut model: accounts::ActiveModel = account.into();
        model.status = Set(AccountStatus::Idle);
        model.current_key_code = Set(None);
        model.update(conn).await?;
        info!("Ключ {key_code}: аккаунт {login} возвращён в пул");
    }

    Ok(())
}

/// Освободить активное назначение ключа, если оно есть.
pub async fn release_for_key<C: ConnectionTrait>(
    conn: &C,
    key_code: &str,
    now: DateTime<Utc>,
) -> Result<Option<assignments::Model>, AppError> {
    let Some(assignment) = active_assignment(conn, key_code).await? else {
        return Ok(None);
    };
    release(conn, &assignment.id, now).await?;
    Ok(Some(assignment))
}

/// Свободный аккаунт, который дольше всех не выдавался.
/// Ни разу не выданные идут первыми, при равенстве решает порядок импорта.
async fn pick_idle<C: ConnectionTrait>(conn: &C) -> Result<Option<accounts::Model>, AppError> {
    let idle = AccountEntity::find()
        .filter(accounts::Column::Status.eq(AccountStatus::Idle))
        .all(conn)
        .await?;

    Ok(idle
        .into_iter()
        .min_by_key(|a| (a.last_assigned_at, a.position)))
}

async fn mark_released<C: ConnectionTrait>(
    conn: &C,
    assignment: assignments::Model,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let mut model: assignments::ActiveModel = assignment.into();
    model.status = Set(AssignmentStatus::Released);
    model.released_at = Set(Some(now));
    model.update(conn).await?;
    Ok(())
}
