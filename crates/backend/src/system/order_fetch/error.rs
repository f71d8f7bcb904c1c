use contracts::system::order_fetch::OrderFetchTaskId;
use sea_orm::DbErr;
use thiserror::Error;

/// Ошибки движка выгрузки заказов, которые вызывающая сторона различает
#[derive(Debug, Error)]
pub enum OrderFetchError {
    #[error("Order fetching is already running for this connection (task {task_id})")]
    AlreadyRunning { task_id: OrderFetchTaskId },

    #[error("Task {0} is already registered")]
    AlreadyRegistered(OrderFetchTaskId),

    #[error("Marketplace connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type OrderFetchResult<T> = Result<T, OrderFetchError>;
