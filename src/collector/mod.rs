pub mod command;

use bytes::Bytes;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use command::ProcessRunner;

/// Exit code a collector uses to say it has nothing to report yet.
pub const NOT_READY_EXIT_CODE: i32 = 10;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{command}' did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("collection cancelled by shutdown")]
    Cancelled,
    #[error("I/O error while collecting: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything observed from one collector invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionOutcome {
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Bytes,
    pub stderr: Bytes,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Success,
    NotReady,
    Failed(Option<i32>),
}

impl CollectionOutcome {
    pub fn exit_kind(&self) -> ExitKind {
        match self.exit_code {
            Some(0) => ExitKind::Success,
            Some(NOT_READY_EXIT_CODE) => ExitKind::NotReady,
            code => ExitKind::Failed(code),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_kind() == ExitKind::Success
    }

    /// Text worth logging for a failed run: stderr, or stdout if stderr is empty.
    pub fn diagnostic_output(&self) -> String {
        let raw = if self.stderr.is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        String::from_utf8_lossy(raw).trim().to_string()
    }
}

/// Runs the external metrics command.
///
/// Implementations must pass `args` as an argument vector, never through a
/// shell, and must not leave the child running once they return.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        command: &str,
        args: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<CollectionOutcome, CollectorError>> + Send;
}
