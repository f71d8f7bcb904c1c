use crate::enums::MarketplaceType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::progress::{OrderFetchProgress, TotalMonths};

/// Тип задачи фоновой выгрузки заказов
pub const ORDER_FETCHING_TASK_TYPE: &str = "order_fetching";

// ============================================================================
// ID Type
// ============================================================================

/// Уникальный идентификатор задачи выгрузки заказов
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderFetchTaskId(pub Uuid);

impl OrderFetchTaskId {
    pub fn new(value: Uuid) -> Self {
        Self(value)
    }

    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn value(&self) -> Uuid {
        self.0
    }

    pub fn as_string(&self) -> String {
        self.0.to_string()
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        Uuid::parse_str(s)
            .map(OrderFetchTaskId::new)
            .map_err(|e| format!("Invalid UUID: {}", e))
    }
}

impl fmt::Display for OrderFetchTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Статус задачи. Задача создаётся сразу в `Running`;
/// остальные статусы терминальные.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Stopped,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Running => "running",
            TaskStatus::Stopped => "stopped",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(TaskStatus::Running),
            "stopped" => Ok(TaskStatus::Stopped),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("Unknown task status: {}", other)),
        }
    }
}

/// Режим выгрузки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Идти назад по месяцам, пока не остановят (или пока не найдена граница истории)
    #[default]
    Auto,
    /// Выгрузить фиксированное количество дней
    Duration,
}

// ============================================================================
// Config
// ============================================================================

/// Параметры запуска. Задаются при создании задачи и больше не меняются.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFetchConfig {
    pub mode: FetchMode,
    /// Глубина выгрузки в днях (только для `FetchMode::Duration`)
    pub duration: Option<u32>,
    /// Остановиться на первом пустом месяце после уже обработанных
    #[serde(default)]
    pub stop_at_first: bool,
    pub start_date: DateTime<Utc>,
}

impl OrderFetchConfig {
    /// Количество месячных окон для режима `Duration`: ceil(duration / 30).
    /// Для `Auto` ограничения нет.
    pub fn duration_months(&self) -> Option<u32> {
        match self.mode {
            FetchMode::Duration => Some(self.duration.unwrap_or(0).div_ceil(30)),
            FetchMode::Auto => None,
        }
    }

    /// Начальное значение `total_months` в прогрессе
    pub fn planned_total_months(&self) -> TotalMonths {
        match self.duration_months() {
            Some(months) => TotalMonths::Known(months),
            None => TotalMonths::Unknown,
        }
    }
}

// ============================================================================
// Aggregate
// ============================================================================

/// Задача фоновой выгрузки истории заказов с маркетплейса (один запуск)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFetchTask {
    pub id: OrderFetchTaskId,
    pub user_id: String,
    pub connection_id: String,
    /// Маркетплейс подключения (для фильтрации списка)
    pub platform: MarketplaceType,
    pub task_type: String,
    pub status: TaskStatus,
    pub config: OrderFetchConfig,
    pub progress: OrderFetchProgress,
    /// Фатальная ошибка (только для `Failed`)
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OrderFetchTask {
    pub fn new_for_insert(
        user_id: String,
        connection_id: String,
        platform: MarketplaceType,
        config: OrderFetchConfig,
    ) -> Self {
        let now = Utc::now();
        let progress = OrderFetchProgress::new(config.planned_total_months());
        Self {
            id: OrderFetchTaskId::new_v4(),
            user_id,
            connection_id,
            platform,
            task_type: ORDER_FETCHING_TASK_TYPE.to_string(),
            status: TaskStatus::Running,
            config,
            progress,
            error: None,
            created_at: now,
            updated_at: now,
            stopped_at: None,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: FetchMode, duration: Option<u32>) -> OrderFetchConfig {
        OrderFetchConfig {
            mode,
            duration,
            stop_at_first: false,
            start_date: Utc::now(),
        }
    }

    #[test]
    fn duration_months_rounds_up() {
        assert_eq!(config(FetchMode::Duration, Some(60)).duration_months(), Some(2));
        assert_eq!(config(FetchMode::Duration, Some(61)).duration_months(), Some(3));
        assert_eq!(config(FetchMode::Duration, Some(1)).duration_months(), Some(1));
        assert_eq!(config(FetchMode::Auto, Some(60)).duration_months(), None);
    }

    #[test]
    fn new_task_starts_running_with_planned_total() {
        let task = OrderFetchTask::new_for_insert(
            "user-1".into(),
            "conn-1".into(),
            MarketplaceType::Wildberries,
            config(FetchMode::Duration, Some(90)),
        );
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.task_type, ORDER_FETCHING_TASK_TYPE);
        assert_eq!(task.progress.total_months, TotalMonths::Known(3));
        assert_eq!(task.progress.current_month, 0);
    }

    #[test]
    fn status_parses_its_own_representation() {
        for status in [
            TaskStatus::Running,
            TaskStatus::Stopped,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<TaskStatus>(), Ok(status));
        }
        assert!(TaskStatus::Completed.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }
}
