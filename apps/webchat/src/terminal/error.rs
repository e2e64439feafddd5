use crate::client::ClientError;
use crate::config::ConfigError;
use crate::telemetry::logging::InitError;
use crate::transport::ConnectionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Connection(#[from] ConnectionError),
    #[error("{0}")]
    Client(#[from] ClientError),
    #[error("logging initialization failed: {0}")]
    Logging(#[from] InitError),
}
