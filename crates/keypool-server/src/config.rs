//! Конфигурация пула ключей.

use keypool_entities::keys::KeyMode;

/// Длина кода по умолчанию (без разделителей).
pub const DEFAULT_KEY_LENGTH: usize = 16;

/// Верхняя граница срока действия ключа режима time, в днях.
pub const MAX_VALIDITY_DAYS: i32 = 36_500;

/// Максимум ключей за одну генерацию.
pub const MAX_KEYS_PER_BATCH: usize = 100;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// URL подключения к БД (sqlite или postgres)
    pub db_url: String,

    /// Срок действия новых ключей режима time, в днях
    pub default_validity_days: i32,

    /// Лимит переключений новых ключей режима switch_count
    pub default_switch_total: i32,

    /// Длина генерируемого кода (без разделителей)
    pub key_length: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            db_url: "sqlite:./keypool.db?mode=rwc".to_string(),
            default_validity_days: 30,
            default_switch_total: 10,
            key_length: DEFAULT_KEY_LENGTH,
        }
    }
}

/// Параметры выпуска партии ключей.
#[derive(Debug, Clone)]
pub struct KeyIssue {
    pub mode: KeyMode,
    pub validity_days: i32,
    pub switch_total: i32,
    pub count: usize,
    pub length: usize,
}

impl PoolConfig {
    /// Параметры выпуска с настройками по умолчанию.
    pub fn key_issue(&self, mode: KeyMode, count: usize) -> KeyIssue {
        KeyIssue {
            mode,
            validity_days: self.default_validity_days,
            switch_total: self.default_switch_total,
            count,
            length: self.key_length,
        }
    }
}
