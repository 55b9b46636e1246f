pub mod config;
pub mod logging;
pub mod node;
pub mod tcp_transport;
