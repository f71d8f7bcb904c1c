use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use contracts::system::order_fetch::{
    ListOrderFetchTasksQuery, OrderFetchTask, OrderFetchTaskListResponse, OrderStatsQuery,
    OrderStatsResponse, StartOrderFetchRequest, StartOrderFetchResponse, StopOrderFetchRequest,
    StopOrderFetchResponse, TaskLogResponse,
};
use serde_json::json;
use std::sync::Arc;

use crate::system::auth::extractor::CurrentUser;
use crate::system::order_fetch::{OrderFetchError, OrderFetchService};

impl OrderFetchError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            OrderFetchError::AlreadyRunning { .. } => StatusCode::CONFLICT,
            OrderFetchError::ConnectionNotFound(_) | OrderFetchError::TaskNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            OrderFetchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            OrderFetchError::AlreadyRegistered(_)
            | OrderFetchError::Database(_)
            | OrderFetchError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for OrderFetchError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Order fetch request failed: {:#}", self);
        }
        let body = match &self {
            OrderFetchError::AlreadyRunning { task_id } => json!({
                "error": self.to_string(),
                "task_id": task_id.as_string(),
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// POST /api/order-fetch/start
pub async fn start(
    State(service): State<Arc<OrderFetchService>>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<StartOrderFetchRequest>,
) -> Result<Json<StartOrderFetchResponse>, OrderFetchError> {
    Ok(Json(service.start(&user_id, request).await?))
}

/// POST /api/order-fetch/stop
pub async fn stop(
    State(service): State<Arc<OrderFetchService>>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<StopOrderFetchRequest>,
) -> Result<Json<StopOrderFetchResponse>, OrderFetchError> {
    Ok(Json(service.stop(&user_id, request).await?))
}

/// GET /api/order-fetch/tasks?status=&platform=&limit=&offset=
pub async fn list_tasks(
    State(service): State<Arc<OrderFetchService>>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<ListOrderFetchTasksQuery>,
) -> Result<Json<OrderFetchTaskListResponse>, OrderFetchError> {
    Ok(Json(service.list(&user_id, query).await?))
}

/// GET /api/order-fetch/tasks/:id
pub async fn get_task(
    State(service): State<Arc<OrderFetchService>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OrderFetchTask>, OrderFetchError> {
    Ok(Json(service.get(&user_id, &id).await?))
}

/// GET /api/order-fetch/tasks/:id/log
pub async fn get_task_log(
    State(service): State<Arc<OrderFetchService>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<TaskLogResponse>, OrderFetchError> {
    Ok(Json(service.read_log(&user_id, &id).await?))
}

/// GET /api/order-fetch/order-stats?connection_id=
pub async fn order_stats(
    State(service): State<Arc<OrderFetchService>>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<OrderStatsQuery>,
) -> Result<Json<OrderStatsResponse>, OrderFetchError> {
    Ok(Json(service.order_stats(&user_id, query).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::order_fetch::logger::TaskLogger;
    use crate::system::order_fetch::test_support::{
        test_connection, InMemoryConnections, InMemoryTaskStore, ScriptedPlatform,
        StaticFactory,
    };
    use crate::system::order_fetch::{TaskRegistry, WorkerSettings};
    use contracts::system::order_fetch::{FetchMode, OrderFetchTaskId};
    use std::time::Duration;

    fn service(logs: &tempfile::TempDir) -> (Arc<OrderFetchService>, String) {
        let connections = Arc::new(InMemoryConnections::new());
        let connection = test_connection("user-1");
        let connection_id = connection.to_string_id();
        connections.add(connection);
        let service = OrderFetchService::new(
            Arc::new(InMemoryTaskStore::new()),
            connections,
            Arc::new(StaticFactory::new(Arc::new(ScriptedPlatform::new(Vec::new())))),
            Arc::new(TaskRegistry::new()),
            Arc::new(TaskLogger::new(logs.path())),
            WorkerSettings {
                iteration_delay: Duration::ZERO,
                page_limit: 100,
                max_auto_months: None,
            },
        );
        (Arc::new(service), connection_id)
    }

    #[test]
    fn errors_map_to_http_statuses() {
        let cases = [
            (
                OrderFetchError::AlreadyRunning {
                    task_id: OrderFetchTaskId::new_v4(),
                },
                StatusCode::CONFLICT,
            ),
            (
                OrderFetchError::ConnectionNotFound("c".into()),
                StatusCode::NOT_FOUND,
            ),
            (OrderFetchError::TaskNotFound("t".into()), StatusCode::NOT_FOUND),
            (
                OrderFetchError::InvalidRequest("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                OrderFetchError::Internal(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn start_then_get_through_handlers() {
        let logs = tempfile::tempdir().unwrap();
        let (service, connection_id) = service(&logs);
        let request = StartOrderFetchRequest {
            connection_id,
            mode: FetchMode::Duration,
            duration: Some(30),
            stop_at_first: false,
        };

        let Json(started) = start(
            State(service.clone()),
            CurrentUser("user-1".into()),
            Json(request),
        )
        .await
        .unwrap();

        let Json(task) = get_task(
            State(service.clone()),
            CurrentUser("user-1".into()),
            Path(started.task_id.clone()),
        )
        .await
        .unwrap();
        assert_eq!(task.id.as_string(), started.task_id);

        let foreign = get_task(
            State(service),
            CurrentUser("user-2".into()),
            Path(started.task_id),
        )
        .await;
        assert_eq!(
            foreign.unwrap_err().into_response().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn invalid_task_id_is_bad_request() {
        let logs = tempfile::tempdir().unwrap();
        let (service, _) = service(&logs);
        let result = stop(
            State(service),
            CurrentUser("user-1".into()),
            Json(StopOrderFetchRequest {
                task_id: "nope".into(),
            }),
        )
        .await;
        assert_eq!(
            result.unwrap_err().into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
