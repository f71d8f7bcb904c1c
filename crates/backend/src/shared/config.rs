use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub order_fetch: OrderFetchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// Настройки фоновой выгрузки заказов
#[derive(Debug, Deserialize, Clone)]
pub struct OrderFetchConfig {
    /// Пауза между месячными окнами (ограничение нагрузки на API площадки)
    #[serde(default = "default_iteration_delay_ms")]
    pub iteration_delay_ms: u64,
    /// Размер страницы при запросе заказов
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    /// Каталог, в котором создаётся `task_logs/`
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    /// Помечать `failed` задачи, оставшиеся в `running` после рестарта
    #[serde(default)]
    pub reconcile_orphans_on_startup: bool,
    /// Предел числа месяцев для режима auto. Не задан = без ограничения.
    #[serde(default)]
    pub max_auto_months: Option<u32>,
}

impl OrderFetchConfig {
    pub fn iteration_delay(&self) -> Duration {
        Duration::from_millis(self.iteration_delay_ms)
    }
}

impl Default for OrderFetchConfig {
    fn default() -> Self {
        Self {
            iteration_delay_ms: default_iteration_delay_ms(),
            page_limit: default_page_limit(),
            log_dir: default_log_dir(),
            reconcile_orphans_on_startup: false,
            max_auto_months: None,
        }
    }
}

fn default_database_path() -> String {
    "target/db/app.db".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_iteration_delay_ms() -> u64 {
    2000
}

fn default_page_limit() -> u32 {
    100
}

fn default_log_dir() -> String {
    ".".to_string()
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[database]
path = "target/db/app.db"

[server]
port = 3000

[order_fetch]
iteration_delay_ms = 2000
page_limit = 100
log_dir = "."
reconcile_orphans_on_startup = false
"#;

/// Load configuration from config.toml file
///
/// Search order:
/// 1. Next to the executable (for production)
/// 2. Falls back to embedded default config
pub fn load_config() -> anyhow::Result<Config> {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let config_path = exe_dir.join("config.toml");

            if config_path.exists() {
                tracing::info!("Loading config from: {}", config_path.display());
                let contents = std::fs::read_to_string(&config_path)?;
                return parse_config(&contents);
            } else {
                tracing::warn!("config.toml not found at: {}", config_path.display());
            }
        }
    }

    tracing::info!("Using default embedded configuration");
    parse_config(DEFAULT_CONFIG)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let config: Config = toml::from_str(contents)?;
    if config.order_fetch.page_limit == 0 {
        anyhow::bail!("order_fetch.page_limit must be greater than zero");
    }
    Ok(config)
}

/// Get the database file path from configuration
/// Resolves relative paths relative to the executable directory
pub fn get_database_path(config: &Config) -> anyhow::Result<PathBuf> {
    let db_path_str = &config.database.path;
    let db_path = Path::new(db_path_str);

    if db_path.is_absolute() {
        return Ok(db_path.to_path_buf());
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            return Ok(exe_dir.join(db_path));
        }
    }

    Ok(PathBuf::from(db_path_str))
}
