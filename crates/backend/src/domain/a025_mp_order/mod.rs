pub mod repository;

pub use repository::MpOrder;
