//! Административный сервис: выпуск ключей, импорт аккаунтов, статистика.

use crate::config::{KeyIssue, MAX_KEYS_PER_BATCH, MAX_VALIDITY_DAYS};
use crate::error::AppError;
use crate::services::pool_service;
use crate::store::Store;
use chrono::Utc;
use keypool_entities::accounts::{self, AccountStatus, Entity as AccountEntity};
use keypool_entities::assignments::{self, AssignmentStatus, Entity as AssignmentEntity};
use keypool_entities::keys::{self, Entity as KeyEntity, KeyMode, KeyStatus};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Алфавит кодов без похожих символов 0/O, 1/I. Ровно 32 символа.
const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Попыток сгенерировать уникальный код до отказа.
const MAX_CODE_ATTEMPTS: usize = 16;

/// Сгенерировать код активации вида `A3X9-K2M8-P5N7-Q4R4`.
pub fn generate_activation_code(length: usize) -> Result<String, AppError> {
    if length == 0 {
        return Err(AppError::InvalidInput("Длина кода должна быть больше нуля".into()));
    }

    let mut buf = vec![0u8; length];
    getrandom::fill(&mut buf)
        .map_err(|e| AppError::Internal(format!("Ошибка генерации случайных байт: {e}")))?;

    // 256 делится на 32 без остатка, поэтому маска не смещает распределение
    let chars: Vec<char> = buf
        .iter()
        .map(|b| CODE_ALPHABET[usize::from(b & 31)] as char)
        .collect();

    Ok(chars
        .chunks(4)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("-"))
}

/// Выпустить партию ключей (не больше [`MAX_KEYS_PER_BATCH`]).
pub async fn generate_keys(store: &Store, issue: &KeyIssue) -> Result<Vec<keys::Model>, AppError> {
    if issue.count == 0 {
        return Err(AppError::InvalidInput("count должен быть больше нуля".into()));
    }
    match issue.mode {
        KeyMode::TimeLimited if !(1..=MAX_VALIDITY_DAYS).contains(&issue.validity_days) => {
            return Err(AppError::InvalidInput(format!(
                "validity_days должен быть от 1 до {MAX_VALIDITY_DAYS}"
            )));
        }
        KeyMode::SwitchCountLimited if issue.switch_total <= 0 => {
            return Err(AppError::InvalidInput(
                "switch_total должен быть больше нуля".into(),
            ));
        }
        _ => {}
    }

    let count = issue.count.min(MAX_KEYS_PER_BATCH);
    let now = Utc::now();
    let txn = store.write().await?;

    let mut generated = Vec::with_capacity(count);
    for _ in 0..count {
        let code = unique_code(txn.conn(), issue.length).await?;
        let (validity_days, switch_total) = match issue.mode {
            KeyMode::TimeLimited => (Some(issue.validity_days), None),
            KeyMode::SwitchCountLimited => (None, Some(issue.switch_total)),
        };

        let key = keys::ActiveModel {
            code: Set(code),
            mode: Set(issue.mode),
            status: Set(KeyStatus::Active),
            device_id: Set(None),
            validity_days: Set(validity_days),
            switch_total: Set(switch_total),
            switch_used: Set(0),
            activated_at: Set(None),
            expires_at: Set(None),
            created_at: Set(now),
        }
        .insert(txn.conn())
        .await?;
        generated.push(key);
    }

    txn.commit().await?;

    info!("Выпущено ключей: {} (режим {})", generated.len(), issue.mode);
    Ok(generated)
}

async fn unique_code<C: ConnectionTrait>(conn: &C, length: usize) -> Result<String, AppError> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = generate_activation_code(length)?;
        if KeyEntity::find_by_id(code.clone()).one(conn).await?.is_none() {
            return Ok(code);
        }
    }
    Err(AppError::Internal(format!(
        "Не удалось подобрать уникальный код за {MAX_CODE_ATTEMPTS} попыток"
    )))
}

/// Получить список всех ключей.
pub async fn list_keys(db: &DatabaseConnection) -> Result<Vec<keys::Model>, AppError> {
    let keys = KeyEntity::find()
        .order_by_asc(keys::Column::CreatedAt)
        .all(db)
        .await?;
    Ok(keys)
}

/// Удалить ключ. Выданный ему аккаунт сначала возвращается в пул.
pub async fn delete_key(store: &Store, code: &str) -> Result<(), AppError> {
    let txn = store.write().await?;

    let key = KeyEntity::find_by_id(code.to_string())
        .one(txn.conn())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ключ активации не найден: {code}")))?;

    pool_service::release_for_key(txn.conn(), code, Utc::now()).await?;
    key.delete(txn.conn()).await?;

    txn.commit().await?;

    info!("Ключ удалён: {code}");
    Ok(())
}

/// Заблокировать или разблокировать ключ. Блокировка освобождает аккаунт.
pub async fn set_key_status(
    store: &Store,
    code: &str,
    status: KeyStatus,
) -> Result<keys::Model, AppError> {
    let txn = store.write().await?;

    let key = KeyEntity::find_by_id(code.to_string())
        .one(txn.conn())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ключ активации не найден: {code}")))?;

    let mut model: keys::ActiveModel = key.into();
    model.status = Set(status);
    let key = model.update(txn.conn()).await?;

    if status == KeyStatus::Banned {
        pool_service::release_for_key(txn.conn(), code, Utc::now()).await?;
    }

    txn.commit().await?;

    info!("Ключ {code}: статус {status:?}");
    Ok(key)
}

/// Аккаунт для импорта.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountImport {
    #[serde(default)]
    pub login: String,
    #[serde(default, alias = "password")]
    pub secret: String,
}

#[derive(Debug, Serialize)]
pub struct ImportedAccount {
    pub id: String,
    pub login: String,
}

#[derive(Debug, Serialize)]
pub struct SkippedAccount {
    pub index: usize,
    pub login: Option<String>,
    pub reason: String,
}

/// Итог импорта аккаунтов.
#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub imported: Vec<ImportedAccount>,
    pub skipped: Vec<SkippedAccount>,
}

/// Импортировать аккаунты в пул. Пустые и уже известные логины пропускаются.
pub async fn import_accounts(
    store: &Store,
    accounts: Vec<AccountImport>,
) -> Result<ImportReport, AppError> {
    if accounts.is_empty() {
        return Err(AppError::InvalidInput("Список аккаунтов пуст".into()));
    }

    let now = Utc::now();
    let txn = store.write().await?;

    let mut position = AccountEntity::find()
        .order_by_desc(accounts::Column::Position)
        .one(txn.conn())
        .await?
        .map_or(0, |a| a.position);

    let mut report = ImportReport {
        imported: Vec::new(),
        skipped: Vec::new(),
    };

    for (index, entry) in accounts.into_iter().enumerate() {
        let login = entry.login.trim().to_string();
        if login.is_empty() || entry.secret.is_empty() {
            report.skipped.push(SkippedAccount {
                index,
                login: (!login.is_empty()).then_some(login),
                reason: "Отсутствует login или secret".into(),
            });
            continue;
        }

        let existing = AccountEntity::find()
            .filter(accounts::Column::Login.eq(login.as_str()))
            .one(txn.conn())
            .await?;
        if existing.is_some() {
            report.skipped.push(SkippedAccount {
                index,
                login: Some(login),
                reason: "Аккаунт уже существует".into(),
            });
            continue;
        }

        position += 1;
        let account = accounts::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            login: Set(login),
            secret: Set(entry.secret),
            status: Set(AccountStatus::Idle),
            current_key_code: Set(None),
            position: Set(position),
            last_assigned_at: Set(None),
            created_at: Set(now),
        }
        .insert(txn.conn())
        .await?;

        report.imported.push(ImportedAccount {
            id: account.id,
            login: account.login,
        });
    }

    txn.commit().await?;

    info!(
        "Импорт аккаунтов: добавлено {}, пропущено {}",
        report.imported.len(),
        report.skipped.len()
    );
    Ok(report)
}

/// Получить список аккаунтов пула в порядке импорта.
pub async fn list_accounts(db: &DatabaseConnection) -> Result<Vec<accounts::Model>, AppError> {
    let accounts = AccountEntity::find()
        .order_by_asc(accounts::Column::Position)
        .all(db)
        .await?;
    Ok(accounts)
}

/// Удалить аккаунт. Выданный аккаунт удалить нельзя.
pub async fn delete_account(store: &Store, id: &str) -> Result<(), AppError> {
    let txn = store.write().await?;

    let account = AccountEntity::find_by_id(id.to_string())
        .one(txn.conn())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Аккаунт не найден: {id}")))?;

    if account.status == AccountStatus::InUse {
        return Err(AppError::AccountInUse(account.login));
    }

    let login = account.login.clone();
    account.delete(txn.conn()).await?;
    txn.commit().await?;

    info!("Аккаунт удалён: {login}");
    Ok(())
}

/// Статистика пула.
#[derive(Debug, Serialize)]
pub struct Stats {
    pub accounts: AccountStats,
    pub keys: KeyStats,
    pub assignments: AssignmentStats,
}

#[derive(Debug, Serialize)]
pub struct AccountStats {
    pub total: u64,
    pub idle: u64,
    pub in_use: u64,
}

#[derive(Debug, Serialize)]
pub struct KeyStats {
    pub total: u64,
    pub active: u64,
    pub banned: u64,
    pub time_mode: u64,
    pub switch_mode: u64,
}

#[derive(Debug, Serialize)]
pub struct AssignmentStats {
    pub total: u64,
    pub active: u64,
}

/// Получить статистику по аккаунтам, ключам и назначениям.
pub async fn get_stats(db: &DatabaseConnection) -> Result<Stats, AppError> {
    let accounts_total = AccountEntity::find().count(db).await?;
    let idle = AccountEntity::find()
        .filter(accounts::Column::Status.eq(AccountStatus::Idle))
        .count(db)
        .await?;

    let keys_total = KeyEntity::find().count(db).await?;
    let banned = KeyEntity::find()
        .filter(keys::Column::Status.eq(KeyStatus::Banned))
        .count(db)
        .await?;
    let time_mode = KeyEntity::find()
        .filter(keys::Column::Mode.eq(KeyMode::TimeLimited))
        .count(db)
        .await?;

    let assignments_total = AssignmentEntity::find().count(db).await?;
    let active_assignments = AssignmentEntity::find()
        .filter(assignments::Column::Status.eq(AssignmentStatus::Active))
        .count(db)
        .await?;

    Ok(Stats {
        accounts: AccountStats {
            total: accounts_total,
            idle,
            in_use: accounts_total - idle,
        },
        keys: KeyStats {
            total: keys_total,
            active: keys_total - banned,
            banned,
            time_mode,
            switch_mode: keys_total - time_mode,
        },
        assignments: AssignmentStats {
            total: assignments_total,
            active: active_assignments,
        },
    })
}

/// Удалить все ключи, аккаунты и назначения.
pub async fn reset(store: &Store) -> Result<(), AppError> {
    let txn = store.write().await?;

    let assignments = AssignmentEntity::delete_many().exec(txn.conn()).await?;
    let accounts = AccountEntity::delete_many().exec(txn.conn()).await?;
    let keys = KeyEntity::delete_many().exec(txn.conn()).await?;

    txn.commit().await?;

    info!(
        "Хранилище очищено: ключей {}, аккаунтов {}, назначений {}",
        keys.rows_affected, accounts.rows_affected, assignments.rows_affected
    );
    Ok(())
}
