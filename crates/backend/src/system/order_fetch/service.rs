use chrono::Utc;
use contracts::domain::a006_connection_mp::aggregate::ConnectionMP;
use contracts::system::order_fetch::{
    FetchMode, ListOrderFetchTasksQuery, OrderFetchConfig, OrderFetchTask, OrderFetchTaskId,
    OrderFetchTaskListResponse, OrderStatsQuery, OrderStatsResponse, StartOrderFetchRequest,
    StartOrderFetchResponse, StopOrderFetchRequest, StopOrderFetchResponse, TaskLogResponse,
    TaskStatus,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::error::{OrderFetchError, OrderFetchResult};
use super::logger::TaskLogger;
use super::registry::{StopOutcome, TaskRegistry};
use super::store::{ConnectionProvider, TaskListFilter, TaskStore, TaskUpdate};
use super::worker::{OrderFetchWorker, WorkerSettings};
use crate::shared::marketplaces::PlatformServiceFactory;

pub const DEFAULT_LIST_LIMIT: u64 = 20;
pub const MAX_LIST_LIMIT: u64 = 100;

const ORPHANED_TASK_ERROR: &str = "Task was interrupted by a server restart";

/// Операции управления выгрузкой заказов: запуск, остановка, список, статистика
pub struct OrderFetchService {
    store: Arc<dyn TaskStore>,
    connections: Arc<dyn ConnectionProvider>,
    platforms: Arc<dyn PlatformServiceFactory>,
    registry: Arc<TaskRegistry>,
    logger: Arc<TaskLogger>,
    settings: WorkerSettings,
}

impl OrderFetchService {
    pub fn new(
        store: Arc<dyn TaskStore>,
        connections: Arc<dyn ConnectionProvider>,
        platforms: Arc<dyn PlatformServiceFactory>,
        registry: Arc<TaskRegistry>,
        logger: Arc<TaskLogger>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            store,
            connections,
            platforms,
            registry,
            logger,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    fn launcher(&self) -> Launcher {
        Launcher {
            store: self.store.clone(),
            platforms: self.platforms.clone(),
            registry: self.registry.clone(),
            logger: self.logger.clone(),
            settings: self.settings.clone(),
        }
    }

    /// Создаёт задачу и запускает воркер в фоне. Не ждёт выполнения.
    pub async fn start(
        &self,
        user_id: &str,
        request: StartOrderFetchRequest,
    ) -> OrderFetchResult<StartOrderFetchResponse> {
        let duration = match request.mode {
            FetchMode::Duration => match request.duration {
                Some(days) if days > 0 => Some(days),
                _ => {
                    return Err(OrderFetchError::InvalidRequest(
                        "duration (days) must be a positive number in duration mode".to_string(),
                    ))
                }
            },
            FetchMode::Auto => None,
        };

        let connection_uuid = Uuid::parse_str(request.connection_id.trim()).map_err(|_| {
            OrderFetchError::InvalidRequest(format!(
                "Invalid connection id: {}",
                request.connection_id
            ))
        })?;
        let connection = self
            .connections
            .get_connection(connection_uuid)
            .await?
            .filter(|c| c.user_id == user_id)
            .ok_or_else(|| OrderFetchError::ConnectionNotFound(request.connection_id.clone()))?;
        if !connection.is_used {
            return Err(OrderFetchError::InvalidRequest(format!(
                "Connection '{}' is disabled",
                connection.description
            )));
        }

        let config = OrderFetchConfig {
            mode: request.mode,
            duration,
            stop_at_first: request.stop_at_first,
            start_date: Utc::now(),
        };
        let task = OrderFetchTask::new_for_insert(
            user_id.to_string(),
            connection.to_string_id(),
            connection.marketplace,
            config,
        );

        // Вставка, регистрация и запуск воркера не прерываются вместе с запросом
        let task_id = task.id;
        tokio::spawn(self.launcher().launch(task, connection))
            .await
            .map_err(|e| {
                OrderFetchError::Internal(anyhow::anyhow!(
                    "Launch of order fetch task {} aborted: {}",
                    task_id,
                    e
                ))
            })??;

        Ok(StartOrderFetchResponse {
            task_id: task_id.as_string(),
            status: TaskStatus::Running,
            message: "Выгрузка заказов запущена".to_string(),
        })
    }

    /// Просит воркер остановиться. Повторная остановка и остановка
    /// завершённой задачи не считаются ошибкой.
    pub async fn stop(
        &self,
        user_id: &str,
        request: StopOrderFetchRequest,
    ) -> OrderFetchResult<StopOrderFetchResponse> {
        let task_id = parse_task_id(&request.task_id)?;

        if let Some(task) = self.store.get(&task_id).await? {
            if task.user_id != user_id {
                return Err(OrderFetchError::TaskNotFound(request.task_id));
            }
        }

        let outcome = self.registry.request_cancel(&task_id);
        let was_active = outcome == StopOutcome::Signalled;
        if was_active {
            info!("Stop requested for order fetch task {}", task_id);
        } else {
            warn!(
                "Stop requested for order fetch task {} which is not active",
                task_id
            );
        }

        Ok(StopOrderFetchResponse {
            task_id: task_id.as_string(),
            was_active,
            message: if was_active {
                "Остановка запрошена".to_string()
            } else {
                "Задача не выполняется".to_string()
            },
        })
    }

    pub async fn list(
        &self,
        user_id: &str,
        query: ListOrderFetchTasksQuery,
    ) -> OrderFetchResult<OrderFetchTaskListResponse> {
        let filter = TaskListFilter {
            status: query.status,
            platform: query.platform,
            limit: query
                .limit
                .unwrap_or(DEFAULT_LIST_LIMIT)
                .clamp(1, MAX_LIST_LIMIT),
            offset: query.offset.unwrap_or(0),
        };
        let (tasks, total) = self.store.list(user_id, &filter).await?;

        let mut active_task_ids = Vec::new();
        for id in self.registry.list_active() {
            let owned = self
                .store
                .get(&id)
                .await?
                .map_or(false, |t| t.user_id == user_id);
            if owned {
                active_task_ids.push(id.as_string());
            }
        }

        Ok(OrderFetchTaskListResponse {
            tasks,
            total,
            active_task_ids,
        })
    }

    pub async fn get(&self, user_id: &str, task_id: &str) -> OrderFetchResult<OrderFetchTask> {
        let id = parse_task_id(task_id)?;
        self.store
            .get(&id)
            .await?
            .filter(|t| t.user_id == user_id)
            .ok_or_else(|| OrderFetchError::TaskNotFound(task_id.to_string()))
    }

    pub async fn read_log(&self, user_id: &str, task_id: &str) -> OrderFetchResult<TaskLogResponse> {
        let task = self.get(user_id, task_id).await?;
        let content = self.logger.read_log(&task.id)?.unwrap_or_default();
        Ok(TaskLogResponse {
            task_id: task.id.as_string(),
            content,
        })
    }

    pub async fn order_stats(
        &self,
        user_id: &str,
        query: OrderStatsQuery,
    ) -> OrderFetchResult<OrderStatsResponse> {
        let connection_id = query
            .connection_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let stats = self.store.order_stats(user_id, connection_id).await?;
        Ok(OrderStatsResponse { stats })
    }

    /// Помечает `failed` задачи, оставшиеся в `running` без живого воркера.
    /// Вызывается при старте, пока реестр пуст.
    pub async fn reconcile_orphans(&self) -> OrderFetchResult<u64> {
        if !self.registry.list_active().is_empty() {
            return Err(OrderFetchError::InvalidRequest(
                "Orphan reconciliation requires an idle registry".to_string(),
            ));
        }
        let swept = self.store.fail_orphaned_running(ORPHANED_TASK_ERROR).await?;
        if swept > 0 {
            warn!("Marked {} orphaned order fetch tasks as failed", swept);
        }
        Ok(swept)
    }
}

/// Владеет всем, что нужно для запуска воркера вне запроса
struct Launcher {
    store: Arc<dyn TaskStore>,
    platforms: Arc<dyn PlatformServiceFactory>,
    registry: Arc<TaskRegistry>,
    logger: Arc<TaskLogger>,
    settings: WorkerSettings,
}

impl Launcher {
    async fn launch(self, task: OrderFetchTask, connection: ConnectionMP) -> OrderFetchResult<()> {
        self.store.create(&task).await?;

        let handle = match self.registry.register(task.id) {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to register order fetch task {}: {}", task.id, e);
                let update = TaskUpdate {
                    error: Some(e.to_string()),
                    completed_at: Some(Utc::now()),
                    ..Default::default()
                };
                if let Err(finish_err) = self
                    .store
                    .finish(&task.id, TaskStatus::Failed, update)
                    .await
                {
                    error!(
                        "Failed to mark order fetch task {} as failed: {}",
                        task.id, finish_err
                    );
                }
                return Err(e);
            }
        };

        info!(
            "Starting order fetch task {} for connection {} ({})",
            task.id,
            task.connection_id,
            task.platform.display_name()
        );

        OrderFetchWorker::new(
            task,
            connection,
            handle,
            self.store,
            self.platforms,
            self.registry,
            self.logger,
            self.settings,
        )
        .spawn();
        Ok(())
    }
}

fn parse_task_id(value: &str) -> OrderFetchResult<OrderFetchTaskId> {
    OrderFetchTaskId::from_string(value.trim()).map_err(OrderFetchError::InvalidRequest)
}
