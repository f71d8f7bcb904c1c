pub mod wildberries;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use contracts::domain::a006_connection_mp::aggregate::ConnectionMP;
use contracts::enums::MarketplaceType;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::a025_mp_order::MpOrder;

/// Сырой заказ в формате площадки
pub type RawOrder = serde_json::Value;

/// Месячное окно выгрузки: [start, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Размер страницы, который передаётся площадке
    pub limit: u32,
}

impl OrderWindow {
    /// Окно длиной в календарный месяц, заканчивающееся в `end`
    pub fn month_before(end: DateTime<Utc>, limit: u32) -> Result<Self> {
        let start = end
            .checked_sub_months(Months::new(1))
            .ok_or_else(|| anyhow::anyhow!("Date {} is out of range", end))?;
        Ok(Self { start, end, limit })
    }

    pub fn contains(&self, moment: &DateTime<Utc>) -> bool {
        *moment >= self.start && *moment < self.end
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchOrdersResult {
    pub success: bool,
    pub data: Vec<RawOrder>,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeOrdersResult {
    pub success: bool,
    pub data: Vec<MpOrder>,
}

/// Клиент площадки, из которого воркер выгружает заказы.
///
/// `normalize_orders` сохраняет заказы сам; воркер использует только количество.
#[async_trait]
pub trait PlatformService: Send + Sync {
    async fn initialize(&self) -> Result<()>;

    async fn fetch_orders(&self, window: &OrderWindow) -> Result<FetchOrdersResult>;

    async fn normalize_orders(&self, raw: Vec<RawOrder>) -> Result<NormalizeOrdersResult>;
}

/// Создаёт клиент площадки для конкретного подключения
pub trait PlatformServiceFactory: Send + Sync {
    fn create(&self, connection: &ConnectionMP) -> Result<Arc<dyn PlatformService>>;
}

type Builder = dyn Fn(&ConnectionMP) -> Result<Arc<dyn PlatformService>> + Send + Sync;

/// Реестр клиентов площадок по типу маркетплейса
pub struct PlatformServiceRegistry {
    builders: HashMap<MarketplaceType, Arc<Builder>>,
}

impl PlatformServiceRegistry {
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Регистрирует конструктор клиента для маркетплейса
    pub fn register<F>(&mut self, marketplace: MarketplaceType, builder: F)
    where
        F: Fn(&ConnectionMP) -> Result<Arc<dyn PlatformService>> + Send + Sync + 'static,
    {
        self.builders.insert(marketplace, Arc::new(builder));
    }

    pub fn supports(&self, marketplace: MarketplaceType) -> bool {
        self.builders.contains_key(&marketplace)
    }
}

impl Default for PlatformServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformServiceFactory for PlatformServiceRegistry {
    fn create(&self, connection: &ConnectionMP) -> Result<Arc<dyn PlatformService>> {
        let builder = self.builders.get(&connection.marketplace).ok_or_else(|| {
            anyhow::anyhow!(
                "Order fetching is not supported for {}",
                connection.marketplace.display_name()
            )
        })?;
        builder(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Noop;

    #[async_trait]
    impl PlatformService for Noop {
        async fn initialize(&self) -> Result<()> {
            Ok(())
        }

        async fn fetch_orders(&self, _window: &OrderWindow) -> Result<FetchOrdersResult> {
            Ok(FetchOrdersResult::default())
        }

        async fn normalize_orders(&self, _raw: Vec<RawOrder>) -> Result<NormalizeOrdersResult> {
            Ok(NormalizeOrdersResult::default())
        }
    }

    #[test]
    fn month_window_steps_back_one_calendar_month() {
        let end = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        let window = OrderWindow::month_before(end, 100).unwrap();
        // February has no 31st: clamped to the last day
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap());
        assert!(window.contains(&window.start));
        assert!(!window.contains(&window.end));
    }

    #[test]
    fn registry_rejects_unregistered_marketplace() {
        let mut registry = PlatformServiceRegistry::new();
        registry.register(MarketplaceType::Ozon, |_| Ok(Arc::new(Noop)));

        let ozon = ConnectionMP::new_for_insert(
            "u".into(),
            MarketplaceType::Ozon,
            "Ozon".into(),
            "key".into(),
        );
        let wb = ConnectionMP::new_for_insert(
            "u".into(),
            MarketplaceType::Wildberries,
            "WB".into(),
            "key".into(),
        );

        assert!(registry.supports(MarketplaceType::Ozon));
        assert!(registry.create(&ozon).is_ok());
        assert!(registry.create(&wb).is_err());
    }
}
