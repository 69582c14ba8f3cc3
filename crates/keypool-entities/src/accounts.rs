//! Entity для таблицы accounts (пул общих учётных записей).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[sea_orm(string_value = "idle")]
    Idle,
    #[sea_orm(string_value = "in_use")]
    InUse,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// UUID первичного ключа
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub login: String,

    #[serde(skip_serializing)]
    pub secret: String,

    pub status: AccountStatus,

    /// Ключ, которому сейчас выдан аккаунт (кэш активного назначения)
    pub current_key_code: Option<String>,

    /// Порядок в пуле (по времени импорта)
    pub position: i64,

    pub last_assigned_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
