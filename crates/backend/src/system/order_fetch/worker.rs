use anyhow::Result;
use chrono::Utc;
use contracts::domain::a006_connection_mp::aggregate::ConnectionMP;
use contracts::system::order_fetch::{
    FetchMode, OrderFetchProgress, OrderFetchTask, PeriodError, TaskStatus, TotalMonths,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::logger::TaskLogger;
use super::registry::{CancellationHandle, TaskRegistry};
use super::store::{TaskStore, TaskUpdate};
use crate::shared::config;
use crate::shared::marketplaces::{OrderWindow, PlatformService, PlatformServiceFactory};

/// Параметры цикла, общие для всех задач процесса
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub iteration_delay: Duration,
    pub page_limit: u32,
    pub max_auto_months: Option<u32>,
}

impl WorkerSettings {
    pub fn from_config(cfg: &config::OrderFetchConfig) -> Self {
        Self {
            iteration_delay: cfg.iteration_delay(),
            page_limit: cfg.page_limit,
            max_auto_months: cfg.max_auto_months,
        }
    }
}

/// Итог одного месячного окна
enum WindowOutcome {
    Orders(u64),
    Empty,
    Rejected,
}

/// Выполняет одну задачу выгрузки от запуска до терминального статуса.
///
/// Идёт назад от текущей даты месячными окнами. Ошибка отдельного месяца
/// записывается в `progress.errors` и не прерывает цикл; остановка
/// проверяется только в начале итерации.
pub struct OrderFetchWorker {
    task: OrderFetchTask,
    connection: ConnectionMP,
    handle: CancellationHandle,
    store: Arc<dyn TaskStore>,
    platforms: Arc<dyn PlatformServiceFactory>,
    registry: Arc<TaskRegistry>,
    logger: Arc<TaskLogger>,
    settings: WorkerSettings,
}

impl OrderFetchWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        task: OrderFetchTask,
        connection: ConnectionMP,
        handle: CancellationHandle,
        store: Arc<dyn TaskStore>,
        platforms: Arc<dyn PlatformServiceFactory>,
        registry: Arc<TaskRegistry>,
        logger: Arc<TaskLogger>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            task,
            connection,
            handle,
            store,
            platforms,
            registry,
            logger,
            settings,
        }
    }

    /// Запускает воркер в фоне; вызывающий код его не ждёт
    pub fn spawn(self) -> JoinHandle<TaskStatus> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) -> TaskStatus {
        let task_id = self.task.id;
        info!(
            "Order fetch task {} started for connection {} ({:?}, stop_at_first={})",
            task_id, self.task.connection_id, self.task.config.mode, self.task.config.stop_at_first
        );
        self.log(&format!(
            "Started: platform {}, mode {:?}, duration {:?}, stop_at_first {}",
            self.task.platform.display_name(),
            self.task.config.mode,
            self.task.config.duration,
            self.task.config.stop_at_first
        ));

        let mut progress = self.task.progress.clone();
        let status = match self.execute(&mut progress).await {
            Ok(()) => {
                let status = if self.handle.is_cancelled() {
                    TaskStatus::Stopped
                } else {
                    TaskStatus::Completed
                };
                if self.finish(status, progress, None).await {
                    status
                } else {
                    TaskStatus::Failed
                }
            }
            Err(e) => {
                error!("Order fetch task {} failed: {:#}", task_id, e);
                self.finish(TaskStatus::Failed, progress, Some(format!("{:#}", e)))
                    .await;
                TaskStatus::Failed
            }
        };

        self.registry.unregister(&task_id);
        status
    }

    /// Предел числа итераций: глубина для `Duration`, опциональный предел для `Auto`
    fn month_limit(&self) -> Option<u32> {
        match self.task.config.mode {
            FetchMode::Duration => self.task.config.duration_months(),
            FetchMode::Auto => self.settings.max_auto_months,
        }
    }

    async fn execute(&self, progress: &mut OrderFetchProgress) -> Result<()> {
        let service = self.platforms.create(&self.connection)?;
        service.initialize().await?;

        let month_limit = self.month_limit();
        let mut current_date = Utc::now();
        let mut months_processed: u32 = 0;

        loop {
            if self.handle.is_cancelled() {
                info!(
                    "Order fetch task {} stopped after {} months",
                    self.task.id, months_processed
                );
                self.log(&format!("Stop requested, exiting after {} months", months_processed));
                break;
            }

            let window = OrderWindow::month_before(current_date, self.settings.page_limit)?;
            let month = months_processed + 1;
            let mut reached_boundary = false;

            match self.fetch_window(service.as_ref(), &window).await {
                Ok(WindowOutcome::Orders(count)) => {
                    progress.orders_processed += count;
                    progress.last_processed_date = Some(window.start);
                    self.log(&format!(
                        "Month {} [{} .. {}): {} orders",
                        month,
                        window.start.format("%Y-%m-%d"),
                        window.end.format("%Y-%m-%d"),
                        count
                    ));
                }
                Ok(WindowOutcome::Rejected) => {
                    warn!(
                        "Order fetch task {}: month {} orders were not normalized",
                        self.task.id, month
                    );
                    self.log(&format!("Month {}: normalization unsuccessful", month));
                }
                Ok(WindowOutcome::Empty) => {
                    self.log(&format!(
                        "Month {} [{} .. {}): no orders",
                        month,
                        window.start.format("%Y-%m-%d"),
                        window.end.format("%Y-%m-%d")
                    ));
                    if self.task.config.stop_at_first && months_processed > 0 {
                        reached_boundary = true;
                    }
                }
                Err(e) => {
                    warn!(
                        "Order fetch task {}: month {} failed: {:#}",
                        self.task.id, month, e
                    );
                    self.log(&format!("Month {} failed: {:#}", month, e));
                    progress.errors.push(PeriodError {
                        month,
                        date: window.start,
                        error: format!("{:#}", e),
                        timestamp: Utc::now(),
                    });
                }
            }

            months_processed = month;
            progress.current_month = months_processed;
            if let Err(e) = self
                .store
                .update(&self.task.id, TaskUpdate::progress(progress.clone()))
                .await
            {
                warn!(
                    "Order fetch task {}: month {} progress was not saved: {}",
                    self.task.id, month, e
                );
                self.log(&format!("Month {}: progress not saved: {}", month, e));
                progress.errors.push(PeriodError {
                    month,
                    date: window.start,
                    error: format!("Progress not saved: {}", e),
                    timestamp: Utc::now(),
                });
                // Повторная неудача означает, что хранилище недоступно
                self.store
                    .update(&self.task.id, TaskUpdate::progress(progress.clone()))
                    .await?;
            }

            if reached_boundary {
                info!(
                    "Order fetch task {} reached the order history boundary at month {}",
                    self.task.id, months_processed
                );
                self.log("Empty month after processed months, history boundary reached");
                break;
            }
            if let Some(limit) = month_limit {
                if months_processed >= limit {
                    self.log(&format!("Month limit {} reached", limit));
                    break;
                }
            }

            current_date = window.start;
            tokio::time::sleep(self.settings.iteration_delay).await;
        }

        Ok(())
    }

    async fn fetch_window(
        &self,
        service: &dyn PlatformService,
        window: &OrderWindow,
    ) -> Result<WindowOutcome> {
        let fetched = service.fetch_orders(window).await?;
        if !fetched.success || fetched.data.is_empty() {
            return Ok(WindowOutcome::Empty);
        }

        let normalized = service.normalize_orders(fetched.data).await?;
        if normalized.success {
            Ok(WindowOutcome::Orders(normalized.data.len() as u64))
        } else {
            Ok(WindowOutcome::Rejected)
        }
    }

    /// Терминальная запись: итоговое число месяцев = выполненные итерации.
    /// Возвращает `false`, если статус не удалось записать.
    async fn finish(
        &self,
        status: TaskStatus,
        mut progress: OrderFetchProgress,
        error: Option<String>,
    ) -> bool {
        let now = Utc::now();
        progress.total_months = TotalMonths::Known(progress.current_month);
        let summary = format!(
            "Finished with status {}: {} months, {} orders, {} period errors",
            status,
            progress.current_month,
            progress.orders_processed,
            progress.errors.len()
        );

        let update = TaskUpdate {
            progress: Some(progress),
            error: error.clone(),
            stopped_at: (status == TaskStatus::Stopped).then_some(now),
            completed_at: Some(now),
        };

        let recorded = match self.store.finish(&self.task.id, status, update).await {
            Ok(true) => {
                info!("Order fetch task {}: {}", self.task.id, summary);
                true
            }
            Ok(false) => {
                warn!(
                    "Order fetch task {} was already in a terminal state, {} not recorded",
                    self.task.id, status
                );
                true
            }
            Err(e) => {
                error!(
                    "Failed to record final status {} for order fetch task {}: {}",
                    status, self.task.id, e
                );
                self.log(&format!("Final status {} not saved: {}", status, e));
                false
            }
        };

        if let Some(error) = error {
            self.log(&format!("Error: {}", error));
        }
        self.log(&summary);
        recorded
    }

    fn log(&self, message: &str) {
        self.logger.log(&self.task.id, message);
    }
}
