//! Entity для таблицы store_lock: единственная строка, которую каждая
//! пишущая транзакция обновляет первой.

use sea_orm::entity::prelude::*;

/// Идентификатор единственной строки блокировки.
pub const WRITE_LOCK_ROW: i32 = 1;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "store_lock")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,

    /// Время последнего захвата
    pub acquired_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
