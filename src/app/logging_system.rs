use super::LogFormat;
use thiserror::Error;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Lines buffered by the background log writer before new lines are dropped.
const LOG_BUFFER_LINES: usize = 8_192;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("failed to build log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },
    #[error("failed to install global subscriber: {0}")]
    Init(String),
}

/// Builds and installs the process-wide tracing subscriber.
///
/// Events go through a bounded, lossy background writer so a slow stdout
/// never stalls a tick.
pub struct LoggingSystem {
    default_directive: &'static str,
    format: LogFormat,
}

impl LoggingSystem {
    pub fn new(format: LogFormat, debug: bool) -> Self {
        Self {
            default_directive: if debug { "debug" } else { "info" },
            format,
        }
    }

    /// `RUST_LOG`, when set and non-empty, replaces the default level.
    fn filter_directives(&self, rust_log: Option<&str>) -> String {
        match rust_log {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => self.default_directive.to_string(),
        }
    }

    fn env_filter(&self, rust_log: Option<&str>) -> Result<EnvFilter, LoggingError> {
        let filter = self.filter_directives(rust_log);
        EnvFilter::try_new(&filter).map_err(|e| LoggingError::Filter {
            filter,
            reason: e.to_string(),
        })
    }

    /// Installs the global subscriber. The returned guard flushes buffered
    /// lines when dropped and must be held until shutdown.
    pub fn init(&self) -> Result<WorkerGuard, LoggingError> {
        let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        let env_filter = self.env_filter(rust_log.as_deref())?;

        let (writer, guard) = NonBlockingBuilder::default()
            .lossy(true)
            .buffered_lines_limit(LOG_BUFFER_LINES)
            .finish(std::io::stdout());

        let registry = tracing_subscriber::registry().with(env_filter);
        let result = match self.format {
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_current_span(false)
                        .with_writer(writer),
                )
                .try_init(),
            LogFormat::Text => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_target(true)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .try_init(),
        };
        result.map_err(|e| LoggingError::Init(e.to_string()))?;

        Ok(guard)
    }
}
