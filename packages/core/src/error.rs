use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::monitor::MonitorError;
use crate::services::ProviderError;

/// Unified application error.
///
/// Everything that can stop the binary ends up here, so `main` has a
/// single place to log it and exit.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("credential check failed: {0}")]
    Credential(#[source] ProviderError),
    #[error("monitor error: {0}")]
    Monitor(#[from] MonitorError),
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
