pub mod client;
pub mod config;
pub mod input;
pub mod message;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod terminal;
pub mod transport;
