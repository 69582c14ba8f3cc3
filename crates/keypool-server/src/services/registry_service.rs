//! Реестр ключей активации: проверка, привязка к устройству, переключение
//! аккаунта, отвязка.
//!
//! Реестр не трогает таблицы аккаунтов и назначений напрямую, всё через
//! [`pool_service`].

use crate::error::AppError;
use crate::services::pool_service::{self, Allocation};
use crate::store::Store;
use chrono::{DateTime, Duration, Utc};
use keypool_entities::keys::{self, Entity as KeyEntity, KeyMode, KeyStatus};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ConnectionTrait, EntityTrait};
use serde::Serialize;
use tracing::{info, warn};

/// Сведения о ключе для ответа клиенту.
#[derive(Debug, Clone, Serialize)]
pub struct KeyInfo {
    pub key_code: String,
    pub mode: KeyMode,
    pub status: KeyStatus,
    pub device_id: Option<String>,
    pub activated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub validity_days: Option<i32>,
    pub switch_total: Option<i32>,
    pub switch_used: i32,
    pub switch_remaining: Option<i32>,
}

impl From<&keys::Model> for KeyInfo {
    fn from(key: &keys::Model) -> Self {
        Self {
            key_code: key.code.clone(),
            mode: key.mode,
            status: key.status,
            device_id: key.device_id.clone(),
            activated_at: key.activated_at,
            expires_at: key.expires_at,
            validity_days: key.validity_days,
            switch_total: key.switch_total,
            switch_used: key.switch_used,
            switch_remaining: key.switch_remaining(),
        }
    }
}

/// Учётные данные выданного аккаунта.
#[derive(Debug, Clone, Serialize)]
pub struct Credential {
    pub account_id: String,
    pub login: String,
    pub secret: String,
    pub assigned_at: DateTime<Utc>,
}

impl From<&Allocation> for Credential {
    fn from(allocation: &Allocation) -> Self {
        Self {
            account_id: allocation.account.id.clone(),
            login: allocation.account.login.clone(),
            secret: allocation.account.secret.clone(),
            assigned_at: allocation.assignment.assigned_at,
        }
    }
}

/// Результат проверки ключа.
///
/// Ключ считается проверенным даже без аккаунта: `has_account = false`, а
/// причина лежит в `account_error`.
#[derive(Debug, Serialize)]
pub struct Validation {
    pub valid: bool,
    #[serde(flatten)]
    pub key: KeyInfo,
    pub checked_at: DateTime<Utc>,
    pub has_account: bool,
    pub account: Option<Credential>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_error: Option<String>,
    #[serde(skip)]
    pub allocation_error: Option<AppError>,
}

/// Результат переключения аккаунта.
#[derive(Debug, Serialize)]
pub struct Switched {
    #[serde(flatten)]
    pub key: KeyInfo,
    pub account: Credential,
}

/// Текущее состояние ключа без изменений.
#[derive(Debug, Serialize)]
pub struct Refreshed {
    #[serde(flatten)]
    pub key: KeyInfo,
    pub has_account: bool,
    pub account: Option<Credential>,
}

/// Проверить ключ на устройстве и выдать ему аккаунт.
pub async fn validate(store: &Store, code: &str, device_id: &str) -> Result<Validation, AppError> {
    require(code, "key_code")?;
    require(device_id, "device_id")?;

    let now = Utc::now();
    let txn = store.write().await?;

    let key = find_key(txn.conn(), code).await?;
    if let Err(e) = check_usable(&key, now) {
        warn!("Ключ {code} отклонён: {e}");
        return Err(e);
    }
    if key.device_id.as_deref().is_some_and(|bound| bound != device_id) {
        warn!("Ключ {code} отклонён: привязан к другому устройству");
        return Err(AppError::DeviceMismatch);
    }

    let key = bind_device(txn.conn(), key, device_id, now).await?;

    // Нехватка аккаунтов не отменяет привязку ключа
    let (account, allocation_error) =
        match pool_service::assign_or_reuse(txn.conn(), code, device_id, now).await {
            Ok(allocation) => (Some(Credential::from(&allocation)), None),
            Err(AppError::PoolExhausted) => {
                warn!("Ключ {code}: свободных аккаунтов нет");
                (None, Some(AppError::PoolExhausted))
            }
            Err(e) => return Err(e),
        };

    txn.commit().await?;

    Ok(Validation {
        valid: true,
        key: KeyInfo::from(&key),
        checked_at: now,
        has_account: account.is_some(),
        account,
        account_error: allocation_error.as_ref().map(|e| e.to_string()),
        allocation_error,
    })
}

/// Сменить аккаунт ключа. Для ключей режима switch_count списывает одно
/// переключение. Операция атомарна: при ошибке старое назначение остаётся.
pub async fn switch(store: &Store, code: &str, device_id: &str) -> Result<Switched, AppError> {
    require(code, "key_code")?;
    require(device_id, "device_id")?;

    let now = Utc::now();
    let txn = store.write().await?;

    let key = find_key(txn.conn(), code).await?;
    // Чужому устройству состояние ключа не раскрывается
    if key.device_id.as_deref() != Some(device_id) {
        warn!("Переключение для ключа {code} отклонено: устройство не совпадает");
        return Err(AppError::DeviceMismatch);
    }
    if let Err(e) = check_usable(&key, now) {
        warn!("Переключение для ключа {code} отклонено: {e}");
        return Err(e);
    }

    let allocation = pool_service::switch_account(txn.conn(), code, device_id, now).await?;
    consume_switch(txn.conn(), code).await?;
    let key = find_key(txn.conn(), code).await?;

    txn.commit().await?;

    info!(
        "Ключ {code}: переключён на аккаунт {} (использовано {})",
        allocation.account.login, key.switch_used
    );

    Ok(Switched {
        key: KeyInfo::from(&key),
        account: Credential::from(&allocation),
    })
}

/// Списать одно переключение. Для ключей режима time ничего не делает.
pub async fn consume_switch<C: ConnectionTrait>(conn: &C, code: &str) -> Result<(), AppError> {
    let key = find_key(conn, code).await?;
    if key.mode == KeyMode::TimeLimited {
        return Ok(());
    }
    if key.quota_exhausted() {
        return Err(AppError::QuotaExhausted);
    }

    let used = key.switch_used + 1;
    let mut model: keys::ActiveModel = key.into();
    model.switch_used = Set(used);
    model.update(conn).await?;
    Ok(())
}

/// Отвязать ключ от устройства и вернуть его аккаунт в пул.
pub async fn release(store: &Store, code: &str, device_id: &str) -> Result<(), AppError> {
    require(code, "key_code")?;
    require(device_id, "device_id")?;

    let now = Utc::now();
    let txn = store.write().await?;

    let key = find_key(txn.conn(), code).await?;
    if key.device_id.as_deref() != Some(device_id) {
        warn!("Отвязка ключа {code} отклонена: устройство не совпадает");
        return Err(AppError::DeviceMismatch);
    }

    let mut model: keys::ActiveModel = key.into();
    model.device_id = Set(None);
    model.update(txn.conn()).await?;

    pool_service::release_for_key(txn.conn(), code, now).await?;

    txn.commit().await?;

    info!("Ключ {code} отвязан от устройства {device_id}");
    Ok(())
}

/// Состояние ключа и его текущий аккаунт. Ничего не изменяет.
pub async fn refresh(store: &Store, code: &str, device_id: &str) -> Result<Refreshed, AppError> {
    require(code, "key_code")?;
    require(device_id, "device_id")?;

    let key = find_key(store.db(), code).await?;
    if key.device_id.as_deref().is_some_and(|bound| bound != device_id) {
        return Err(AppError::DeviceMismatch);
    }

    let account = pool_service::current_assignment(store.db(), code)
        .await?
        .map(|allocation| Credential::from(&allocation));

    Ok(Refreshed {
        key: KeyInfo::from(&key),
        has_account: account.is_some(),
        account,
    })
}

/// Текущий аккаунт ключа.
pub async fn current(store: &Store, code: &str) -> Result<Credential, AppError> {
    require(code, "key_code")?;

    pool_service::current_assignment(store.db(), code)
        .await?
        .map(|allocation| Credential::from(&allocation))
        .ok_or_else(|| AppError::NotFound(format!("У ключа {code} нет выданного аккаунта")))
}

/// Найти ключ по коду.
pub async fn find_key<C: ConnectionTrait>(conn: &C, code: &str) -> Result<keys::Model, AppError> {
    KeyEntity::find_by_id(code.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ключ активации не найден: {code}")))
}

/// Проверки статуса, срока и лимита, общие для проверки и переключения.
fn check_usable(key: &keys::Model, now: DateTime<Utc>) -> Result<(), AppError> {
    if key.status == KeyStatus::Banned {
        return Err(AppError::Banned);
    }
    if key.is_expired(now) {
        return Err(AppError::Expired);
    }
    if key.quota_exhausted() {
        return Err(AppError::QuotaExhausted);
    }
    Ok(())
}

/// Привязать устройство; при первой проверке зафиксировать активацию и срок.
async fn bind_device<C: ConnectionTrait>(
    conn: &C,
    key: keys::Model,
    device_id: &str,
    now: DateTime<Utc>,
) -> Result<keys::Model, AppError> {
    let first_activation = key.activated_at.is_none();
    let expires_at = match (key.mode, key.validity_days) {
        (KeyMode::TimeLimited, Some(days)) => Some(
            Duration::try_days(i64::from(days))
                .and_then(|validity| now.checked_add_signed(validity))
                .ok_or_else(|| {
                    AppError::InvalidInput(format!(
                        "Недопустимый срок действия ключа {}: {days} дн.",
                        key.code
                    ))
                })?,
        ),
        _ => None,
    };
    let code = key.code.clone();

    let mut model: keys::ActiveModel = key.into();
    model.device_id = Set(Some(device_id.to_string()));
    if first_activation {
        model.activated_at = Set(Some(now));
        if expires_at.is_some() {
            model.expires_at = Set(expires_at);
        }
    }
    let key = model.update(conn).await?;

    if first_activation {
        info!("Ключ {code} активирован на устройстве {device_id}");
    }
    Ok(key)
}

fn require(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{field} обязателен")));
    }
    Ok(())
}
