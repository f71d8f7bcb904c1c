pub mod order_fetch;
