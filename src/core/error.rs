//! Application-wide error types.
//!
//! Library modules carry their own error enums (`EngineError`, `RunError`, …);
//! `AppError` is what the binary surfaces to the user.

use thiserror::Error;

use crate::runner::RunError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("run failed: {0}")]
    Run(#[from] RunError),

    #[error("service error: {0}")]
    Service(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
