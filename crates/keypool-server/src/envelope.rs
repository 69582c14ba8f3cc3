//! Конверт ответа `{code, message, data}`: `code = 0` означает успех.

use crate::error::AppError;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct Envelope {
    pub code: i32,
    pub message: String,
    pub data: Value,
}

impl Envelope {
    pub fn success<T: Serialize>(data: &T, message: &str) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self {
                code: 0,
                message: message.to_string(),
                data,
            },
            Err(e) => Self::error(&AppError::Internal(format!("Ошибка сериализации: {e}"))),
        }
    }

    pub fn error(err: &AppError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            data: Value::Null,
        }
    }

    pub fn from_result<T: Serialize>(result: Result<T, AppError>, message: &str) -> Self {
        match result {
            Ok(data) => Self::success(&data, message),
            Err(e) => Self::error(&e),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}
