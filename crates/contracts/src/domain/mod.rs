pub mod a006_connection_mp;
