//! Entity-модели хранилища: ключи активации, пул аккаунтов, назначения.

pub mod accounts;
pub mod assignments;
pub mod keys;
pub mod store_lock;
