//! Entity для таблицы keys (ключи активации).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Режим ключа: ограничение по времени или по числу переключений.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum KeyMode {
    #[sea_orm(string_value = "time")]
    #[serde(rename = "time")]
    TimeLimited,
    #[sea_orm(string_value = "switch_count")]
    #[serde(rename = "switch_count")]
    SwitchCountLimited,
}

impl std::str::FromStr for KeyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "time" | "time-limited" => Ok(KeyMode::TimeLimited),
            "switch_count" | "switch-count" | "switch" => Ok(KeyMode::SwitchCountLimited),
            other => Err(format!(
                "Неизвестный режим ключа: {other}. Допустимые: time, switch_count"
            )),
        }
    }
}

impl std::fmt::Display for KeyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMode::TimeLimited => write!(f, "time"),
            KeyMode::SwitchCountLimited => write!(f, "switch_count"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "banned")]
    Banned,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "keys")]
pub struct Model {
    /// Код активации (XXXX-XXXX-XXXX-XXXX)
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,

    pub mode: KeyMode,

    pub status: KeyStatus,

    /// Устройство, к которому привязан ключ
    pub device_id: Option<String>,

    /// Срок действия в днях (только для режима time)
    pub validity_days: Option<i32>,

    /// Лимит переключений (только для режима switch_count)
    pub switch_total: Option<i32>,

    pub switch_used: i32,

    /// Момент первой успешной проверки
    pub activated_at: Option<DateTimeUtc>,

    /// Вычисляется при активации для режима time
    pub expires_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
}

impl Model {
    /// Остаток переключений; `None` для ключей с ограничением по времени.
    pub fn switch_remaining(&self) -> Option<i32> {
        match self.mode {
            KeyMode::TimeLimited => None,
            KeyMode::SwitchCountLimited => {
                Some((self.switch_total.unwrap_or(0) - self.switch_used).max(0))
            }
        }
    }

    /// Исчерпан ли лимит переключений.
    pub fn quota_exhausted(&self) -> bool {
        self.mode == KeyMode::SwitchCountLimited
            && self.switch_used >= self.switch_total.unwrap_or(0)
    }

    /// Истёк ли срок действия на момент `now`. Граница не включается:
    /// ровно в `expires_at` ключ ещё действует.
    pub fn is_expired(&self, now: DateTimeUtc) -> bool {
        self.mode == KeyMode::TimeLimited && self.expires_at.is_some_and(|at| at < now)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
