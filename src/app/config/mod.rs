mod cli;
mod validation;
pub mod value_parsers;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cli::{Config, RunConfig};
pub use value_parsers::{AgentAddress, parse_duration};

pub const DEFAULT_AGENT_ADDR: &str = "localhost:3457";
pub const DEFAULT_METRICS_CMD: &str =
    "/var/vcap/jobs/service-metrics-adapter/bin/collect-service-metrics";
pub const DEFAULT_METRICS_INTERVAL: &str = "60";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Must provide --{0}")]
    MissingField(&'static str),
    #[error("Invalid value for --{field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error(transparent)]
    Parse(#[from] clap::Error),
}

impl ConfigError {
    /// Name of the flag this error refers to, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ConfigError::MissingField(field) | ConfigError::InvalidField { field, .. } => {
                Some(*field)
            }
            ConfigError::Parse(_) => None,
        }
    }
}

/// Output format for the diagnostic log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable compact lines
    Text,
    /// One JSON object per event
    #[default]
    Json,
}
