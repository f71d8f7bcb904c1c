pub mod a006_connection_mp;
pub mod a025_mp_order;
