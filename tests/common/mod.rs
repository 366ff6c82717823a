#![allow(dead_code)]

use bytes::Bytes;
use parking_lot::Mutex;
use service_metrics::collector::{CollectionOutcome, CollectorError, CommandRunner};
use service_metrics::domain::Metric;
use service_metrics::sender::{ForwardError, MetricForwarder};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::subscriber::DefaultGuard;

/// What a [`ScriptedRunner`] does on one call.
#[derive(Debug, Clone)]
pub enum Step {
    Exit { code: i32, stdout: &'static str },
    /// Blocks until the timeout or cancellation, like a hung collector.
    Hang,
}

/// Fake collector that replays scripted steps and repeats the last one.
#[derive(Clone)]
pub struct ScriptedRunner {
    steps: Arc<Mutex<VecDeque<Step>>>,
    calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
}

impl ScriptedRunner {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into_iter().collect())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn printing(stdout: &'static str) -> Self {
        Self::new([Step::Exit { code: 0, stdout }])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().clone()
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.lock();
        if steps.len() > 1 {
            steps.pop_front().unwrap()
        } else {
            steps.front().cloned().unwrap_or(Step::Exit { code: 0, stdout: "[]" })
        }
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        command: &str,
        args: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<CollectionOutcome, CollectorError> {
        self.calls.lock().push((command.to_string(), args.to_vec()));

        match self.next_step() {
            Step::Exit { code, stdout } => Ok(CollectionOutcome {
                exit_code: Some(code),
                stdout: Bytes::from_static(stdout.as_bytes()),
                stderr: Bytes::new(),
                duration: Duration::from_millis(1),
            }),
            Step::Hang => {
                tokio::select! {
                    () = tokio::time::sleep(timeout) => Err(CollectorError::Timeout {
                        command: command.to_string(),
                        timeout,
                    }),
                    () = cancel.cancelled() => Err(CollectorError::Cancelled),
                }
            }
        }
    }
}

/// Forwarder that records every metric it is asked to send.
#[derive(Clone, Default)]
pub struct RecordingForwarder {
    sent: Arc<Mutex<Vec<(Metric, String)>>>,
}

impl RecordingForwarder {
    pub fn sent(&self) -> Vec<(Metric, String)> {
        self.sent.lock().clone()
    }
}

impl MetricForwarder for RecordingForwarder {
    async fn forward(&self, metric: &Metric, origin: &str) -> Result<(), ForwardError> {
        self.sent.lock().push((metric.clone(), origin.to_string()));
        Ok(())
    }
}

/// Writes a shell script into a fresh temp dir and returns its path.
///
/// Run it as `/bin/sh <path>` rather than exec'ing it directly; a freshly
/// written executable can fail with ETXTBSY while other tests fork.
pub fn write_script(body: &str) -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("collect-metrics");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let path = path.to_string_lossy().into_owned();
    (dir, path)
}

/// Log output captured by a thread-local subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    /// Installs a debug-level subscriber for the current thread. Tasks spawned
    /// on a current-thread runtime log into it as well.
    pub fn install() -> (Self, DefaultGuard) {
        let logs = Self::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (logs, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }

    pub fn count(&self, message: &str) -> usize {
        self.contents().matches(message).count()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
