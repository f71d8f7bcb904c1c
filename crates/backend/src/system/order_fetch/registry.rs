use contracts::system::order_fetch::OrderFetchTaskId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::error::{OrderFetchError, OrderFetchResult};

/// Флаг отмены одной задачи.
///
/// Воркер проверяет его только на границе итераций: уже начатый запрос
/// к площадке не прерывается.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle(Arc<AtomicBool>);

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Результат запроса на остановку
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Флаг выставлен, воркер остановится на следующей итерации
    Signalled,
    /// Задача уже завершена или её хэндл потерян (например, после рестарта)
    NotActive,
}

/// Реестр выполняющихся воркеров текущего процесса.
/// Единственный канал, через который можно остановить задачу.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    handles: Mutex<HashMap<OrderFetchTaskId, CancellationHandle>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<OrderFetchTaskId, CancellationHandle>> {
        // The map stays consistent even if a holder panicked
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Регистрирует новый хэндл `{stop: false}` для задачи
    pub fn register(&self, task_id: OrderFetchTaskId) -> OrderFetchResult<CancellationHandle> {
        let mut handles = self.handles();
        if handles.contains_key(&task_id) {
            return Err(OrderFetchError::AlreadyRegistered(task_id));
        }
        let handle = CancellationHandle::new();
        handles.insert(task_id, handle.clone());
        tracing::debug!("Registered order fetch task {}", task_id);
        Ok(handle)
    }

    /// Просит воркер остановиться. Повторный вызов ничего не меняет.
    pub fn request_cancel(&self, task_id: &OrderFetchTaskId) -> StopOutcome {
        match self.handles().get(task_id) {
            Some(handle) => {
                handle.cancel();
                StopOutcome::Signalled
            }
            None => StopOutcome::NotActive,
        }
    }

    pub fn unregister(&self, task_id: &OrderFetchTaskId) -> bool {
        let removed = self.handles().remove(task_id).is_some();
        if removed {
            tracing::debug!("Unregistered order fetch task {}", task_id);
        }
        removed
    }

    pub fn is_active(&self, task_id: &OrderFetchTaskId) -> bool {
        self.handles().contains_key(task_id)
    }

    pub fn list_active(&self) -> Vec<OrderFetchTaskId> {
        self.handles().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_hands_out_a_fresh_handle() {
        let registry = TaskRegistry::new();
        let id = OrderFetchTaskId::new_v4();

        let handle = registry.register(id).unwrap();
        assert!(!handle.is_cancelled());
        assert!(registry.is_active(&id));
        assert_eq!(registry.list_active(), vec![id]);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = TaskRegistry::new();
        let id = OrderFetchTaskId::new_v4();
        registry.register(id).unwrap();

        assert!(matches!(
            registry.register(id),
            Err(OrderFetchError::AlreadyRegistered(dup)) if dup == id
        ));
    }

    #[test]
    fn cancel_reaches_the_workers_handle_and_is_idempotent() {
        let registry = TaskRegistry::new();
        let id = OrderFetchTaskId::new_v4();
        let handle = registry.register(id).unwrap();

        assert_eq!(registry.request_cancel(&id), StopOutcome::Signalled);
        assert!(handle.is_cancelled());
        assert_eq!(registry.request_cancel(&id), StopOutcome::Signalled);
        assert!(handle.is_cancelled());
    }

    #[test]
    fn cancel_of_unknown_or_finished_task_is_not_active() {
        let registry = TaskRegistry::new();
        let id = OrderFetchTaskId::new_v4();
        assert_eq!(registry.request_cancel(&id), StopOutcome::NotActive);

        registry.register(id).unwrap();
        assert!(registry.unregister(&id));
        assert!(!registry.unregister(&id));
        assert_eq!(registry.request_cancel(&id), StopOutcome::NotActive);
        assert!(registry.list_active().is_empty());
    }

    #[test]
    fn concurrent_registration_from_many_threads() {
        let registry = Arc::new(TaskRegistry::new());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let id = OrderFetchTaskId::new_v4();
                    registry.register(id).unwrap();
                    registry.request_cancel(&id);
                    id
                })
            })
            .collect();

        for t in threads {
            let id = t.join().unwrap();
            assert!(registry.is_active(&id));
        }
        assert_eq!(registry.list_active().len(), 8);
    }
}
