use super::value_parsers::{AgentAddress, parse_duration};
use super::{ConfigError, DEFAULT_AGENT_ADDR, DEFAULT_METRICS_CMD, DEFAULT_METRICS_INTERVAL, LogFormat};
use clap::Parser;
use serde::Serialize;
use std::time::Duration;

/// Raw command line, with environment variable fallbacks.
#[derive(Parser, Debug, Clone)]
#[command(name = "service-metrics", author, version, about, long_about = None)]
pub struct Config {
    /// Required. Source name for metrics emitted by this process, e.g. service-name
    #[arg(long, env = "ORIGIN")]
    pub origin: Option<String>,

    /// Source ID attached to every envelope (defaults to the origin)
    #[arg(long, env = "SOURCE_ID")]
    pub source_id: Option<String>,

    /// Address of the metrics-ingestion agent
    #[arg(long, env = "METRON_ADDR", default_value = DEFAULT_AGENT_ADDR)]
    pub metron_addr: AgentAddress,

    /// Path to metrics command
    #[arg(long, env = "METRICS_CMD", default_value = DEFAULT_METRICS_CMD)]
    pub metrics_cmd: String,

    /// Argument to pass on to metrics-cmd (multi-valued, order preserved)
    #[arg(
        long = "metrics-cmd-arg",
        env = "METRICS_CMD_ARG",
        allow_hyphen_values = true
    )]
    pub metrics_cmd_args: Vec<String>,

    /// Interval to run metrics-cmd (seconds, or with a ms/s/m/h suffix)
    #[arg(
        long,
        env = "METRICS_INTERVAL",
        default_value = DEFAULT_METRICS_INTERVAL,
        value_parser = parse_duration
    )]
    pub metrics_interval: Duration,

    /// Kill metrics-cmd if it runs longer than this (defaults to the interval)
    #[arg(long, env = "METRICS_CMD_TIMEOUT", value_parser = parse_duration)]
    pub metrics_cmd_timeout: Option<Duration>,

    /// Output debug logging
    #[arg(long, env = "DEBUG")]
    pub debug: bool,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", default_value = "json")]
    pub log_format: LogFormat,
}

/// Fully resolved, immutable daemon configuration.
///
/// Built once at startup and shared read-only for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfig {
    pub origin: String,
    pub source_id: String,
    pub agent_address: AgentAddress,
    pub command: String,
    pub command_args: Vec<String>,
    pub interval: Duration,
    pub command_timeout: Duration,
    pub debug: bool,
    pub log_format: LogFormat,
}

impl RunConfig {
    /// Configuration with every optional field at its documented default.
    pub fn new(origin: impl Into<String>) -> Self {
        let origin = origin.into();
        let interval = Duration::from_secs(60);
        Self {
            source_id: origin.clone(),
            origin,
            agent_address: AgentAddress::new("localhost", 3457),
            command: DEFAULT_METRICS_CMD.to_string(),
            command_args: Vec::new(),
            interval,
            command_timeout: interval,
            debug: false,
            log_format: LogFormat::default(),
        }
    }

    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Config::from_args(args)?.resolve()
    }
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Config::try_parse_from(args)?)
    }

    /// Validates the raw flags and fills in derived defaults.
    pub fn resolve(self) -> Result<RunConfig, ConfigError> {
        self.validate()?;

        let origin = self
            .origin
            .filter(|o| !o.trim().is_empty())
            .ok_or(ConfigError::MissingField("origin"))?;
        let source_id = self.source_id.unwrap_or_else(|| origin.clone());
        let command_timeout = self.metrics_cmd_timeout.unwrap_or(self.metrics_interval);

        Ok(RunConfig {
            origin,
            source_id,
            agent_address: self.metron_addr,
            command: self.metrics_cmd,
            command_args: self.metrics_cmd_args,
            interval: self.metrics_interval,
            command_timeout,
            debug: self.debug,
            log_format: self.log_format,
        })
    }
}
