use crate::enums::MarketplaceType;
use serde::{Deserialize, Serialize};

use super::aggregate::{FetchMode, TaskStatus};

/// Запрос на запуск выгрузки заказов
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartOrderFetchRequest {
    /// ID подключения к маркетплейсу (ConnectionMP)
    pub connection_id: String,

    #[serde(default)]
    pub mode: FetchMode,

    /// Глубина в днях, обязательна для `FetchMode::Duration`
    #[serde(default)]
    pub duration: Option<u32>,

    #[serde(default)]
    pub stop_at_first: bool,
}

/// Запрос на остановку задачи
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopOrderFetchRequest {
    pub task_id: String,
}

/// Фильтры и пагинация списка задач
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOrderFetchTasksQuery {
    pub status: Option<TaskStatus>,
    pub platform: Option<MarketplaceType>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Запрос статистики заказов
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderStatsQuery {
    pub connection_id: Option<String>,
}
