//! Сервисы ядра: реестр ключей, пул аккаунтов, администрирование, очистка.

pub mod admin_service;
pub mod cleanup_service;
pub mod pool_service;
pub mod registry_service;
