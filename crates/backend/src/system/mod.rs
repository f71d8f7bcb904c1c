pub mod auth;
pub mod initialization;
pub mod middleware;
pub mod order_fetch;
pub mod tracing;
