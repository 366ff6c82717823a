use thiserror::Error;

use crate::app::ConfigError;
use crate::collector::CollectorError;
use crate::parser::DecodeError;
use crate::sender::ForwardError;

/// Top-level error type for the collection pipeline.
///
/// Only `Config` and `Startup` ever escape to `main`; everything else is
/// contained within a tick and logged.
#[derive(Error, Debug)]
pub enum ServiceMetricsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Collection error: {0}")]
    Collection(#[from] CollectorError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Forward error: {0}")]
    Forward(#[from] ForwardError),

    #[error("Startup error: {0}")]
    Startup(String),
}

impl ServiceMetricsError {
    /// Process exit code for errors that terminate the daemon.
    pub fn exit_code(&self) -> i32 {
        match self {
            ServiceMetricsError::Config(_) => 2,
            _ => 1,
        }
    }
}
