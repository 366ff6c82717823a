pub mod config;
pub mod logging_system;
pub mod scheduler;
pub mod shutdown;

pub use config::{AgentAddress, Config, ConfigError, LogFormat, RunConfig};
pub use logging_system::{LoggingError, LoggingSystem};
pub use scheduler::{Scheduler, TickOutcome, TickReport, TickState};
pub use shutdown::SignalHandler;

use crate::collector::ProcessRunner;
use crate::domain::ServiceMetricsError;
use crate::sender::{ForwardStatsSnapshot, UdpForwarder};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct App {
    config: Arc<RunConfig>,
}

impl App {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_config(RunConfig::from_args(args)?))
    }

    pub fn from_config(config: RunConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Connects to the agent and runs the scheduler until `cancel` fires.
    ///
    /// Only an unresolvable agent address fails here; everything that goes
    /// wrong inside a tick is logged and retried on the next one.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<ForwardStatsSnapshot, ServiceMetricsError> {
        let config = &self.config;
        let forwarder = UdpForwarder::connect(&config.agent_address, config.source_id.clone()).await?;

        info!(
            version = crate::VERSION,
            origin = %config.origin,
            source_id = %config.source_id,
            agent = %config.agent_address,
            resolved = %forwarder.target(),
            "Starting service-metrics"
        );

        let scheduler = Scheduler::new(Arc::clone(config), ProcessRunner::new(), forwarder);
        scheduler.run(cancel).await;

        Ok(scheduler.forwarder().stats())
    }
}

/// Process entry point; returns the exit code.
pub async fn main() -> i32 {
    let config = match RunConfig::from_args(std::env::args_os()) {
        Ok(config) => config,
        Err(ConfigError::Parse(e)) => {
            // clap renders help/version on stdout with exit code 0
            let code = e.exit_code();
            if let Err(print_err) = e.print() {
                eprintln!("{print_err}");
            }
            return code;
        }
        Err(e) => {
            eprintln!("{e}");
            return ServiceMetricsError::from(e).exit_code();
        }
    };

    let logging = LoggingSystem::new(config.log_format, config.debug);
    let _log_guard = match logging.init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };

    let cancel = CancellationToken::new();
    let signals = match SignalHandler::install(cancel.clone()) {
        Ok(signals) => signals,
        Err(e) => {
            error!("Failed to install signal handlers: {}", e);
            return 1;
        }
    };

    let app = App::from_config(config);
    let code = match app.run(&cancel).await {
        Ok(stats) => {
            info!(
                sent = stats.sent,
                failed = stats.failed,
                oversized = stats.oversized,
                bytes_sent = stats.bytes_sent,
                "Shutdown complete"
            );
            0
        }
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    };

    signals.detach();
    code
}
