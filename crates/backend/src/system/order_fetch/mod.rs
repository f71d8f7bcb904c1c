pub mod error;
pub mod logger;
pub mod registry;
pub mod repository;
pub mod service;
pub mod store;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::OrderFetchError;
pub use registry::TaskRegistry;
pub use service::OrderFetchService;
pub use worker::WorkerSettings;
