//! In-memory store and scripted platform for worker and service tests

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use contracts::domain::a006_connection_mp::aggregate::ConnectionMP;
use contracts::enums::MarketplaceType;
use contracts::system::order_fetch::{
    FetchMode, OrderFetchConfig, OrderFetchProgress, OrderFetchTask, OrderFetchTaskId,
    PlatformOrderStats, TaskStatus,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

use super::error::{OrderFetchError, OrderFetchResult};
use super::store::{ConnectionProvider, TaskListFilter, TaskStore, TaskUpdate};
use crate::domain::a025_mp_order::MpOrder;
use crate::shared::marketplaces::{
    FetchOrdersResult, NormalizeOrdersResult, OrderWindow, PlatformService,
    PlatformServiceFactory, RawOrder,
};

pub fn test_connection(user_id: &str) -> ConnectionMP {
    ConnectionMP::new_for_insert(
        user_id.to_string(),
        MarketplaceType::Wildberries,
        "WB test".to_string(),
        "token".to_string(),
    )
}

pub fn auto_config(stop_at_first: bool) -> OrderFetchConfig {
    OrderFetchConfig {
        mode: FetchMode::Auto,
        duration: None,
        stop_at_first,
        start_date: Utc::now(),
    }
}

pub fn duration_config(days: u32) -> OrderFetchConfig {
    OrderFetchConfig {
        mode: FetchMode::Duration,
        duration: Some(days),
        stop_at_first: false,
        start_date: Utc::now(),
    }
}

// ============================================================================
// Store
// ============================================================================

#[derive(Default)]
struct StoreState {
    tasks: HashMap<OrderFetchTaskId, OrderFetchTask>,
    history: HashMap<OrderFetchTaskId, Vec<OrderFetchProgress>>,
    stats: Vec<PlatformOrderStats>,
}

/// `TaskStore` в памяти; проверка и вставка под одним мьютексом
#[derive(Default)]
pub struct InMemoryTaskStore {
    state: Mutex<StoreState>,
    fail_updates: AtomicBool,
    failing_updates: AtomicUsize,
    fail_finishes: AtomicBool,
    create_gate: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Все записанные версии прогресса задачи, включая терминальную
    pub fn progress_history(&self, task_id: &OrderFetchTaskId) -> Vec<OrderFetchProgress> {
        self.state
            .lock()
            .unwrap()
            .history
            .get(task_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Следующие `count` вызовов `update` завершатся ошибкой
    pub fn fail_next_updates(&self, count: usize) {
        self.failing_updates.store(count, Ordering::SeqCst);
    }

    pub fn fail_finishes(&self, fail: bool) {
        self.fail_finishes.store(fail, Ordering::SeqCst);
    }

    /// Следующий `create` сообщит о входе и будет ждать `release`
    pub fn hold_next_create(&self, entered: Arc<Notify>, release: Arc<Notify>) {
        *self.create_gate.lock().unwrap() = Some((entered, release));
    }

    pub fn tasks(&self) -> Vec<OrderFetchTask> {
        self.state.lock().unwrap().tasks.values().cloned().collect()
    }

    pub fn set_stats(&self, stats: Vec<PlatformOrderStats>) {
        self.state.lock().unwrap().stats = stats;
    }

    pub fn running_count(&self, user_id: &str, connection_id: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .tasks
            .values()
            .filter(|t| {
                t.user_id == user_id
                    && t.connection_id == connection_id
                    && t.status == TaskStatus::Running
            })
            .count()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, task: &OrderFetchTask) -> OrderFetchResult<()> {
        let gate = self.create_gate.lock().unwrap().take();
        if let Some((entered, release)) = gate {
            entered.notify_one();
            release.notified().await;
        }
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.tasks.values().find(|t| {
            t.user_id == task.user_id
                && t.connection_id == task.connection_id
                && t.task_type == task.task_type
                && t.status == TaskStatus::Running
        }) {
            return Err(OrderFetchError::AlreadyRunning {
                task_id: existing.id,
            });
        }
        state.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn get(&self, task_id: &OrderFetchTaskId) -> OrderFetchResult<Option<OrderFetchTask>> {
        Ok(self.state.lock().unwrap().tasks.get(task_id).cloned())
    }

    async fn update(
        &self,
        task_id: &OrderFetchTaskId,
        update: TaskUpdate,
    ) -> OrderFetchResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(OrderFetchError::Internal(anyhow::anyhow!(
                "database is locked"
            )));
        }
        let transient = self
            .failing_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if transient {
            return Err(OrderFetchError::Internal(anyhow::anyhow!(
                "transient write failure"
            )));
        }
        let mut state = self.state.lock().unwrap();
        let task = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| OrderFetchError::TaskNotFound(task_id.as_string()))?;
        update.apply_to(task);
        if let Some(progress) = update.progress {
            state.history.entry(*task_id).or_default().push(progress);
        }
        Ok(())
    }

    async fn finish(
        &self,
        task_id: &OrderFetchTaskId,
        status: TaskStatus,
        update: TaskUpdate,
    ) -> OrderFetchResult<bool> {
        if self.fail_finishes.load(Ordering::SeqCst) {
            return Err(OrderFetchError::Internal(anyhow::anyhow!(
                "database is locked"
            )));
        }
        let mut state = self.state.lock().unwrap();
        let task = match state.tasks.get_mut(task_id) {
            Some(task) if task.status == TaskStatus::Running => task,
            _ => return Ok(false),
        };
        task.status = status;
        update.apply_to(task);
        if let Some(progress) = update.progress {
            state.history.entry(*task_id).or_default().push(progress);
        }
        Ok(true)
    }

    async fn find_active_by_connection(
        &self,
        user_id: &str,
        connection_id: &str,
        task_type: &str,
    ) -> OrderFetchResult<Option<OrderFetchTask>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tasks
            .values()
            .find(|t| {
                t.user_id == user_id
                    && t.connection_id == connection_id
                    && t.task_type == task_type
                    && t.status == TaskStatus::Running
            })
            .cloned())
    }

    async fn list(
        &self,
        user_id: &str,
        filter: &TaskListFilter,
    ) -> OrderFetchResult<(Vec<OrderFetchTask>, u64)> {
        let state = self.state.lock().unwrap();
        let mut tasks: Vec<_> = state
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .filter(|t| filter.platform.map_or(true, |p| t.platform == p))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = tasks.len() as u64;
        let page = tasks
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn fail_orphaned_running(&self, message: &str) -> OrderFetchResult<u64> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let mut swept = 0;
        for task in state.tasks.values_mut() {
            if task.status == TaskStatus::Running {
                task.status = TaskStatus::Failed;
                task.error = Some(message.to_string());
                task.completed_at = Some(now);
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn order_stats(
        &self,
        _user_id: &str,
        _connection_id: Option<&str>,
    ) -> OrderFetchResult<Vec<PlatformOrderStats>> {
        Ok(self.state.lock().unwrap().stats.clone())
    }
}

/// Подключения в памяти
#[derive(Default)]
pub struct InMemoryConnections {
    connections: Mutex<HashMap<Uuid, ConnectionMP>>,
}

impl InMemoryConnections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, connection: ConnectionMP) {
        self.connections
            .lock()
            .unwrap()
            .insert(connection.id.value(), connection);
    }
}

#[async_trait]
impl ConnectionProvider for InMemoryConnections {
    async fn get_connection(&self, id: Uuid) -> OrderFetchResult<Option<ConnectionMP>> {
        Ok(self.connections.lock().unwrap().get(&id).cloned())
    }
}

// ============================================================================
// Platform
// ============================================================================

/// Ответ площадки на один запрос окна
pub enum Step {
    Orders(usize),
    Empty,
    Fail(&'static str),
    /// Сообщает `entered`, ждёт `release`, затем выполняет `then`
    Hold {
        entered: Arc<Notify>,
        release: Arc<Notify>,
        then: Box<Step>,
    },
}

impl Step {
    fn repeat(&self) -> Step {
        match self {
            Step::Orders(n) => Step::Orders(*n),
            Step::Empty => Step::Empty,
            Step::Fail(msg) => Step::Fail(*msg),
            Step::Hold { then, .. } => then.repeat(),
        }
    }
}

/// Площадка со сценарием ответов; после конца сценария отвечает `fallback`
pub struct ScriptedPlatform {
    steps: Mutex<VecDeque<Step>>,
    fallback: Step,
    init_error: Option<&'static str>,
    windows: Mutex<Vec<OrderWindow>>,
    fetches: AtomicUsize,
}

impl ScriptedPlatform {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            fallback: Step::Empty,
            init_error: None,
            windows: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn repeating(step: Step) -> Self {
        Self {
            fallback: step,
            ..Self::new(Vec::new())
        }
    }

    pub fn failing_init(message: &'static str) -> Self {
        Self {
            init_error: Some(message),
            ..Self::new(Vec::new())
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn windows(&self) -> Vec<OrderWindow> {
        self.windows.lock().unwrap().clone()
    }

    fn next_step(&self) -> Step {
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.repeat())
    }
}

fn respond(step: Step) -> Result<FetchOrdersResult> {
    match step {
        Step::Orders(n) => Ok(FetchOrdersResult {
            success: true,
            data: (0..n)
                .map(|i| serde_json::json!({ "srid": format!("order-{}", i) }))
                .collect(),
        }),
        Step::Empty => Ok(FetchOrdersResult {
            success: true,
            data: Vec::new(),
        }),
        Step::Fail(msg) => Err(anyhow::anyhow!(msg)),
        Step::Hold { then, .. } => respond(*then),
    }
}

#[async_trait]
impl PlatformService for ScriptedPlatform {
    async fn initialize(&self) -> Result<()> {
        match self.init_error {
            Some(msg) => Err(anyhow::anyhow!(msg)),
            None => Ok(()),
        }
    }

    async fn fetch_orders(&self, window: &OrderWindow) -> Result<FetchOrdersResult> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.windows.lock().unwrap().push(*window);

        let step = self.next_step();
        if let Step::Hold {
            entered, release, ..
        } = &step
        {
            entered.notify_one();
            release.notified().await;
        }
        respond(step)
    }

    async fn normalize_orders(&self, raw: Vec<RawOrder>) -> Result<NormalizeOrdersResult> {
        let data = raw
            .into_iter()
            .enumerate()
            .map(|(i, payload)| MpOrder {
                user_id: "user-1".to_string(),
                connection_id: "connection".to_string(),
                platform: MarketplaceType::Wildberries,
                order_number: format!("order-{}", i),
                order_date: Utc::now(),
                total_amount: None,
                payload,
            })
            .collect();
        Ok(NormalizeOrdersResult {
            success: true,
            data,
        })
    }
}

/// Фабрика, всегда возвращающая одну и ту же площадку
pub struct StaticFactory {
    platform: Arc<ScriptedPlatform>,
}

impl StaticFactory {
    pub fn new(platform: Arc<ScriptedPlatform>) -> Self {
        Self { platform }
    }
}

impl PlatformServiceFactory for StaticFactory {
    fn create(&self, _connection: &ConnectionMP) -> Result<Arc<dyn PlatformService>> {
        let platform: Arc<dyn PlatformService> = self.platform.clone();
        Ok(platform)
    }
}
