use async_trait::async_trait;
use chrono::{DateTime, Utc};
use contracts::domain::a006_connection_mp::aggregate::ConnectionMP;
use contracts::enums::MarketplaceType;
use contracts::system::order_fetch::{
    OrderFetchProgress, OrderFetchTask, OrderFetchTaskId, PlatformOrderStats, TaskStatus,
};
use uuid::Uuid;

use super::error::OrderFetchResult;

/// Частичное обновление строки задачи. Незаданные поля не трогаются,
/// `progress` заменяется целиком.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub progress: Option<OrderFetchProgress>,
    pub error: Option<String>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskUpdate {
    pub fn progress(progress: OrderFetchProgress) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    /// Применяет обновление к задаче в памяти
    pub fn apply_to(&self, task: &mut OrderFetchTask) {
        if let Some(progress) = &self.progress {
            task.progress = progress.clone();
        }
        if let Some(error) = &self.error {
            task.error = Some(error.clone());
        }
        if let Some(stopped_at) = self.stopped_at {
            task.stopped_at = Some(stopped_at);
        }
        if let Some(completed_at) = self.completed_at {
            task.completed_at = Some(completed_at);
        }
        task.updated_at = Utc::now();
    }
}

/// Фильтры списка задач
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListFilter {
    pub status: Option<TaskStatus>,
    pub platform: Option<MarketplaceType>,
    pub limit: u64,
    pub offset: u64,
}

/// Долговременное хранилище задач выгрузки и производные запросы
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Вставляет новую задачу в статусе `running`.
    /// Возвращает `AlreadyRunning`, если для той же пары (пользователь, подключение)
    /// уже есть выполняющаяся задача того же типа.
    async fn create(&self, task: &OrderFetchTask) -> OrderFetchResult<()>;

    async fn get(&self, task_id: &OrderFetchTaskId) -> OrderFetchResult<Option<OrderFetchTask>>;

    /// Last-write-wins обновление полей
    async fn update(&self, task_id: &OrderFetchTaskId, update: TaskUpdate)
        -> OrderFetchResult<()>;

    /// Терминальная запись. Применяется, только пока задача в `running`;
    /// возвращает false, если статус уже терминальный.
    async fn finish(
        &self,
        task_id: &OrderFetchTaskId,
        status: TaskStatus,
        update: TaskUpdate,
    ) -> OrderFetchResult<bool>;

    async fn find_active_by_connection(
        &self,
        user_id: &str,
        connection_id: &str,
        task_type: &str,
    ) -> OrderFetchResult<Option<OrderFetchTask>>;

    /// Задачи пользователя (новые сверху) и общее количество по фильтру
    async fn list(
        &self,
        user_id: &str,
        filter: &TaskListFilter,
    ) -> OrderFetchResult<(Vec<OrderFetchTask>, u64)>;

    /// Переводит все `running` задачи в `failed` (сверка после рестарта)
    async fn fail_orphaned_running(&self, message: &str) -> OrderFetchResult<u64>;

    async fn order_stats(
        &self,
        user_id: &str,
        connection_id: Option<&str>,
    ) -> OrderFetchResult<Vec<PlatformOrderStats>>;
}

/// Источник подключений к маркетплейсам
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn get_connection(&self, id: Uuid) -> OrderFetchResult<Option<ConnectionMP>>;
}
