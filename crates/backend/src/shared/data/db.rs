use once_cell::sync::OnceCell;
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement};
use std::path::Path;

static DB_CONN: OnceCell<DatabaseConnection> = OnceCell::new();

/// Таблицы, необходимые движку выгрузки заказов
const SCHEMA: &[(&str, &str)] = &[
    (
        "a006_connection_mp",
        r#"
        CREATE TABLE IF NOT EXISTS a006_connection_mp (
            id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL,
            marketplace TEXT NOT NULL,
            description TEXT NOT NULL,
            api_key TEXT NOT NULL,
            supplier_id TEXT,
            is_used INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    ),
    (
        "sys_order_fetch_tasks",
        r#"
        CREATE TABLE IF NOT EXISTS sys_order_fetch_tasks (
            id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL,
            connection_id TEXT NOT NULL,
            platform TEXT NOT NULL,
            task_type TEXT NOT NULL,
            status TEXT NOT NULL,
            config_json TEXT NOT NULL,
            progress_json TEXT NOT NULL,
            error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            stopped_at TEXT,
            completed_at TEXT
        );
        "#,
    ),
    (
        "ux_sys_order_fetch_tasks_running",
        // At most one running task per (user, connection, type)
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS ux_sys_order_fetch_tasks_running
            ON sys_order_fetch_tasks (user_id, connection_id, task_type)
            WHERE status = 'running';
        "#,
    ),
    (
        "idx_sys_order_fetch_tasks_user",
        r#"
        CREATE INDEX IF NOT EXISTS idx_sys_order_fetch_tasks_user
            ON sys_order_fetch_tasks (user_id, created_at);
        "#,
    ),
    (
        "mp_orders",
        r#"
        CREATE TABLE IF NOT EXISTS mp_orders (
            id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL,
            connection_id TEXT NOT NULL,
            platform TEXT NOT NULL,
            order_number TEXT NOT NULL,
            order_date TEXT NOT NULL,
            total_amount REAL,
            payload_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (connection_id, order_number)
        );
        "#,
    ),
    (
        "idx_mp_orders_user_platform",
        r#"
        CREATE INDEX IF NOT EXISTS idx_mp_orders_user_platform
            ON mp_orders (user_id, platform, order_date);
        "#,
    ),
];

pub async fn initialize_database(db_path: Option<&Path>) -> anyhow::Result<()> {
    let db_file = db_path.unwrap_or_else(|| Path::new("target/db/app.db"));
    if let Some(parent) = db_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let absolute_path = if db_file.is_absolute() {
        db_file.to_path_buf()
    } else {
        std::env::current_dir()?.join(db_file)
    };
    // Normalize path separators and ensure proper URL form on Windows
    let normalized = absolute_path.to_string_lossy().replace('\\', "/");
    let needs_leading_slash = !normalized.starts_with('/') && normalized.contains(':');
    let prefix = if needs_leading_slash { "/" } else { "" };
    let db_url = format!("sqlite://{}{}?mode=rwc", prefix, normalized);
    let conn = Database::connect(&db_url).await?;

    bootstrap_schema(&conn).await?;

    DB_CONN
        .set(conn)
        .map_err(|_| anyhow::anyhow!("Database connection already initialized"))?;
    tracing::info!("Database ready at {}", absolute_path.display());
    Ok(())
}

/// Создаёт недостающие таблицы и индексы
pub async fn bootstrap_schema(conn: &DatabaseConnection) -> anyhow::Result<()> {
    for (name, sql) in SCHEMA {
        tracing::debug!("Ensuring schema object {}", name);
        conn.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            sql.to_string(),
        ))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create {}: {}", name, e))?;
    }
    Ok(())
}

/// Глобальное подключение. Паникует, если `initialize_database` ещё не вызывался.
pub fn get_connection() -> &'static DatabaseConnection {
    DB_CONN
        .get()
        .expect("Database connection has not been initialized")
}

#[cfg(test)]
pub async fn connect_in_memory() -> DatabaseConnection {
    // One pooled connection: every clone sees the same in-memory database
    let mut options = sea_orm::ConnectOptions::new("sqlite::memory:".to_owned());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let conn = Database::connect(options).await.expect("in-memory sqlite");
    bootstrap_schema(&conn).await.expect("schema bootstrap");
    conn
}
