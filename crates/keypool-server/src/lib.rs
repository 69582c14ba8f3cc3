//! Ядро выдачи ключей активации и пула общих аккаунтов.

pub mod config;
pub mod envelope;
pub mod error;
pub mod services;
pub mod store;


pub use store::Store;
