use crate::enums::MarketplaceType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::aggregate::{OrderFetchTask, TaskStatus};

/// Ответ на запуск. Воркер уже работает в фоне, ошибки выгрузки
/// видны только через статус и прогресс задачи.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartOrderFetchResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopOrderFetchResponse {
    pub task_id: String,
    /// false, если задача уже завершилась или её хэндл потерян после рестарта
    pub was_active: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFetchTaskListResponse {
    pub tasks: Vec<OrderFetchTask>,
    pub total: u64,
    pub active_task_ids: Vec<String>,
}

/// Статистика загруженных заказов по одному маркетплейсу
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformOrderStats {
    pub platform: MarketplaceType,
    pub oldest_order: Option<DateTime<Utc>>,
    pub newest_order: Option<DateTime<Utc>>,
    pub total_orders: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatsResponse {
    pub stats: Vec<PlatformOrderStats>,
}

/// Содержимое лог-файла сессии задачи
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLogResponse {
    pub task_id: String,
    pub content: String,
}
