pub mod connection;
pub mod pumps;
pub mod send;
