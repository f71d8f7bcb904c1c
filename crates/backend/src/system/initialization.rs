use anyhow::Result;
use contracts::enums::MarketplaceType;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::shared::config::Config;
use crate::shared::marketplaces::wildberries::WildberriesOrderService;
use crate::shared::marketplaces::PlatformServiceRegistry;
use crate::system::order_fetch::logger::TaskLogger;
use crate::system::order_fetch::repository::SqliteTaskStore;
use crate::system::order_fetch::{OrderFetchService, TaskRegistry, WorkerSettings};

/// Клиенты площадок, для которых поддерживается выгрузка заказов
pub fn platform_registry(db: &DatabaseConnection) -> PlatformServiceRegistry {
    let mut platforms = PlatformServiceRegistry::new();
    platforms.register(
        MarketplaceType::Wildberries,
        WildberriesOrderService::builder(db.clone()),
    );
    platforms
}

/// Собирает сервис выгрузки заказов поверх SQLite
pub fn build_order_fetch_service(config: &Config, db: &DatabaseConnection) -> OrderFetchService {
    let store = Arc::new(SqliteTaskStore::new(db.clone()));
    let platforms = platform_registry(db);
    for marketplace in MarketplaceType::all() {
        if !platforms.supports(marketplace) {
            tracing::info!(
                "Order fetching is not available for {}",
                marketplace.display_name()
            );
        }
    }

    OrderFetchService::new(
        store.clone(),
        store,
        Arc::new(platforms),
        Arc::new(TaskRegistry::new()),
        Arc::new(TaskLogger::new(&config.order_fetch.log_dir)),
        WorkerSettings::from_config(&config.order_fetch),
    )
}

/// Сверка задач, оставшихся в `running` после прошлого запуска (если включена)
pub async fn reconcile_orphaned_tasks(config: &Config, service: &OrderFetchService) -> Result<()> {
    if !config.order_fetch.reconcile_orphans_on_startup {
        tracing::info!("Orphaned order fetch task reconciliation is disabled");
        return Ok(());
    }
    let swept = service.reconcile_orphans().await?;
    tracing::info!("Orphaned order fetch tasks reconciled: {}", swept);
    Ok(())
}
