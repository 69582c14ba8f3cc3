//! Типы ошибок ядра ключей и пула аккаунтов.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Не найдено: {0}")]
    NotFound(String),

    #[error("Ключ активации заблокирован")]
    Banned,

    #[error("Срок действия ключа истёк")]
    Expired,

    #[error("Лимит переключений исчерпан")]
    QuotaExhausted,

    #[error("Ключ привязан к другому устройству")]
    DeviceMismatch,

    #[error("Нет свободных аккаунтов, попробуйте позже")]
    PoolExhausted,

    #[error("Аккаунт используется: {0}")]
    AccountInUse(String),

    #[error("Неверный запрос: {0}")]
    InvalidInput(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl AppError {
    /// Числовой код для конверта ответа `{code, message, data}`; 0 означает успех.
    pub fn code(&self) -> i32 {
        match self {
            AppError::Expired => 1001,
            AppError::Banned => 1002,
            AppError::DeviceMismatch => 1003,
            AppError::QuotaExhausted => 1004,
            AppError::PoolExhausted => 1005,
            AppError::AccountInUse(_) => 1006,
            AppError::NotFound(_) | AppError::InvalidInput(_) | AppError::Internal(_) => 1,
        }
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(e: sea_orm::DbErr) -> Self {
        AppError::Internal(e.to_string())
    }
}
