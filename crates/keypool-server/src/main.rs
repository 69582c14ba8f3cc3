//! Точка входа: операторский CLI пула ключей.

use clap::{Parser, Subcommand};
use keypool_entities::keys::{KeyMode, KeyStatus};
use keypool_server::config::{PoolConfig, DEFAULT_KEY_LENGTH};
use keypool_server::envelope::Envelope;
use keypool_server::error::AppError;
use keypool_server::services::admin_service::{self, AccountImport};
use keypool_server::services::{cleanup_service, registry_service};
use keypool_server::Store;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "keypool",
    about = "Ключи активации и пул общих аккаунтов"
)]
struct Cli {
    /// URL базы данных
    #[arg(
        long,
        global = true,
        default_value = "sqlite:./keypool.db?mode=rwc",
        env = "DATABASE_URL"
    )]
    db_url: String,

    /// Срок действия новых ключей режима time (дни)
    #[arg(long, global = true, default_value_t = 30, env = "KEYPOOL_VALIDITY_DAYS")]
    validity_days: i32,

    /// Лимит переключений новых ключей режима switch_count
    #[arg(long, global = true, default_value_t = 10, env = "KEYPOOL_SWITCH_TOTAL")]
    switch_total: i32,

    /// Длина генерируемого кода без разделителей
    #[arg(long, global = true, default_value_t = DEFAULT_KEY_LENGTH)]
    key_length: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Проверить ключ и выдать аккаунт
    Validate { key_code: String, device_id: String },
    /// Показать состояние ключа и текущий аккаунт
    Refresh { key_code: String, device_id: String },
    /// Сменить аккаунт ключа
    Switch { key_code: String, device_id: String },
    /// Отвязать ключ от устройства и вернуть аккаунт в пул
    Release { key_code: String, device_id: String },
    /// Текущий аккаунт ключа
    Current { key_code: String },
    /// Выпустить ключи
    GenerateKeys {
        /// Режим: time или switch_count
        #[arg(long, default_value = "time")]
        mode: KeyMode,
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Список ключей
    ListKeys,
    /// Удалить ключ
    DeleteKey { key_code: String },
    /// Заблокировать ключ
    BanKey { key_code: String },
    /// Разблокировать ключ
    UnbanKey { key_code: String },
    /// Импортировать аккаунты из JSON-файла `[{"login": ..., "secret": ...}]`
    ImportAccounts { file: PathBuf },
    /// Список аккаунтов (без секретов)
    ListAccounts,
    /// Удалить свободный аккаунт
    DeleteAccount { id: String },
    /// Статистика пула
    Stats,
    /// Освободить аккаунты просроченных и заблокированных ключей
    Cleanup {
        /// Повторять с периодом в секундах
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Удалить все данные
    Reset {
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // stdout занят JSON-ответами, логи идут в stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = PoolConfig {
        db_url: cli.db_url,
        default_validity_days: cli.validity_days,
        default_switch_total: cli.switch_total,
        key_length: cli.key_length,
    };

    let store = Store::connect(config.db_url.as_str()).await?;
    let envelope = execute(&store, &config, cli.command).await?;

    println!("{}", serde_json::to_string_pretty(&envelope)?);

    Ok(if envelope.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn execute(
    store: &Store,
    config: &PoolConfig,
    command: Command,
) -> anyhow::Result<Envelope> {
    let envelope = match command {
        Command::Validate {
            key_code,
            device_id,
        } => Envelope::from_result(
            registry_service::validate(store, &key_code, &device_id).await,
            "Ключ проверен",
        ),
        Command::Refresh {
            key_code,
            device_id,
        } => Envelope::from_result(
            registry_service::refresh(store, &key_code, &device_id).await,
            "success",
        ),
        Command::Switch {
            key_code,
            device_id,
        } => Envelope::from_result(
            registry_service::switch(store, &key_code, &device_id).await,
            "Аккаунт переключён",
        ),
        Command::Release {
            key_code,
            device_id,
        } => Envelope::from_result(
            registry_service::release(store, &key_code, &device_id).await,
            "Устройство отвязано",
        ),
        Command::Current { key_code } => Envelope::from_result(
            registry_service::current(store, &key_code).await,
            "success",
        ),
        Command::GenerateKeys { mode, count } => {
            let issue = config.key_issue(mode, count);
            Envelope::from_result(
                admin_service::generate_keys(store, &issue).await,
                &format!("Выпущены ключи режима {mode}"),
            )
        }
        Command::ListKeys => {
            Envelope::from_result(admin_service::list_keys(store.db()).await, "success")
        }
        Command::DeleteKey { key_code } => Envelope::from_result(
            admin_service::delete_key(store, &key_code).await,
            "Ключ удалён",
        ),
        Command::BanKey { key_code } => Envelope::from_result(
            admin_service::set_key_status(store, &key_code, KeyStatus::Banned).await,
            "Ключ заблокирован",
        ),
        Command::UnbanKey { key_code } => Envelope::from_result(
            admin_service::set_key_status(store, &key_code, KeyStatus::Active).await,
            "Ключ разблокирован",
        ),
        Command::ImportAccounts { file } => {
            let raw = tokio::fs::read_to_string(&file).await?;
            let accounts: Vec<AccountImport> = serde_json::from_str(&raw)?;
            Envelope::from_result(
                admin_service::import_accounts(store, accounts).await,
                "Импорт завершён",
            )
        }
        Command::ListAccounts => {
            Envelope::from_result(admin_service::list_accounts(store.db()).await, "success")
        }
        Command::DeleteAccount { id } => Envelope::from_result(
            admin_service::delete_account(store, &id).await,
            "Аккаунт удалён",
        ),
        Command::Stats => {
            Envelope::from_result(admin_service::get_stats(store.db()).await, "success")
        }
        Command::Cleanup { interval: None } => Envelope::from_result(
            cleanup_service::cleanup_once(store).await,
            "Очистка выполнена",
        ),
        Command::Cleanup {
            interval: Some(secs),
        } => {
            info!("Очистка каждые {secs} сек, Ctrl+C для остановки");
            tokio::select! {
                _ = cleanup_service::run_cleanup_loop(store.clone(), Duration::from_secs(secs)) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Получен сигнал завершения, останавливаю очистку...");
                }
            }
            Envelope::success(&(), "Очистка остановлена")
        }
        Command::Reset { yes: false } => Envelope::error(&AppError::InvalidInput(
            "Для очистки хранилища укажите --yes".into(),
        )),
        Command::Reset { yes: true } => {
            Envelope::from_result(admin_service::reset(store).await, "Хранилище очищено")
        }
    };

    Ok(envelope)
}
