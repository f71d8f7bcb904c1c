use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::system::order_fetch::OrderFetchService;

/// Маршруты API выгрузки заказов
pub fn configure_routes(service: Arc<OrderFetchService>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/order-fetch/start", post(handlers::order_fetch::start))
        .route("/api/order-fetch/stop", post(handlers::order_fetch::stop))
        .route(
            "/api/order-fetch/tasks",
            get(handlers::order_fetch::list_tasks),
        )
        .route(
            "/api/order-fetch/tasks/:id",
            get(handlers::order_fetch::get_task),
        )
        .route(
            "/api/order-fetch/tasks/:id/log",
            get(handlers::order_fetch::get_task_log),
        )
        .route(
            "/api/order-fetch/order-stats",
            get(handlers::order_fetch::order_stats),
        )
        .with_state(service)
}
