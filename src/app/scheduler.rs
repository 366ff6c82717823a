use super::RunConfig;
use crate::collector::{CollectionOutcome, CollectorError, CommandRunner, ExitKind};
use crate::parser::{self, DecodedBatch};
use crate::sender::MetricForwarder;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Phase of the collection cycle currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TickState {
    #[default]
    Idle,
    Collecting,
    Decoding,
    Forwarding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TickOutcome {
    /// Every decoded record was forwarded.
    Success,
    /// Some records were skipped or failed to forward, but at least one went out.
    Partial,
    /// Nothing usable came out of this tick.
    Failure,
    /// The collector was not ready or the tick was interrupted by shutdown.
    Skipped,
}

/// Summary of one collect-decode-forward cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    /// Furthest state the tick got to before finishing.
    pub state_reached: TickState,
    pub decoded: usize,
    pub skipped: usize,
    pub forwarded: usize,
    pub failed: usize,
    pub duration: Duration,
    pub outcome: TickOutcome,
}

impl TickReport {
    fn new(tick: u64) -> Self {
        Self {
            tick,
            state_reached: TickState::Collecting,
            decoded: 0,
            skipped: 0,
            forwarded: 0,
            failed: 0,
            duration: Duration::ZERO,
            outcome: TickOutcome::Failure,
        }
    }
}

/// Drives the collector on a fixed interval and forwards what it reports.
pub struct Scheduler<R, F> {
    config: Arc<RunConfig>,
    runner: R,
    forwarder: F,
    state: RwLock<TickState>,
    ticks: AtomicU64,
}

impl<R, F> Scheduler<R, F>
where
    R: CommandRunner,
    F: MetricForwarder,
{
    pub fn new(config: Arc<RunConfig>, runner: R, forwarder: F) -> Self {
        Self {
            config,
            runner,
            forwarder,
            state: RwLock::new(TickState::Idle),
            ticks: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn forwarder(&self) -> &F {
        &self.forwarder
    }

    pub fn state(&self) -> TickState {
        *self.state.read()
    }

    /// Number of ticks started so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Runs ticks until `cancel` fires. The first tick starts immediately.
    pub async fn run(&self, cancel: &CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            origin = %self.config.origin,
            command = %self.config.command,
            interval = ?self.config.interval,
            timeout = ?self.config.command_timeout,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.run_tick(cancel).await;

            if cancel.is_cancelled() {
                break;
            }
        }

        info!(ticks = self.ticks(), "Scheduler stopped");
    }

    /// Executes exactly one collect-decode-forward cycle.
    pub async fn run_tick(&self, cancel: &CancellationToken) -> TickReport {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let start = Instant::now();
        let mut report = TickReport::new(tick);

        self.execute(&mut report, cancel).await;

        self.set_state(TickState::Idle);
        report.duration = start.elapsed();
        log_report(&report);
        report
    }

    async fn execute(&self, report: &mut TickReport, cancel: &CancellationToken) {
        self.enter(report, TickState::Collecting);
        let Some(outcome) = self.collect(report, cancel).await else {
            return;
        };

        self.enter(report, TickState::Decoding);
        let Some(batch) = decode(report, &outcome) else {
            return;
        };

        self.enter(report, TickState::Forwarding);
        self.forward_batch(report, &batch).await;

        report.outcome = if report.failed == 0 && report.skipped == 0 {
            TickOutcome::Success
        } else if report.forwarded > 0 {
            TickOutcome::Partial
        } else {
            TickOutcome::Failure
        };
    }

    /// Returns the outcome only when it should be decoded.
    async fn collect(
        &self,
        report: &mut TickReport,
        cancel: &CancellationToken,
    ) -> Option<CollectionOutcome> {
        let config = &self.config;
        debug!(
            command = %config.command,
            args = ?config.command_args,
            "executing-metrics-cmd starting"
        );

        let result = self
            .runner
            .run(&config.command, &config.command_args, config.command_timeout, cancel)
            .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(CollectorError::Cancelled) => {
                info!("Metrics command interrupted by shutdown");
                report.outcome = TickOutcome::Skipped;
                return None;
            }
            Err(e) => {
                error!(command = %config.command, error = %e, "Error running metrics command");
                report.outcome = TickOutcome::Failure;
                return None;
            }
        };

        debug!(
            exit_code = ?outcome.exit_code,
            elapsed = ?outcome.duration,
            stdout = %String::from_utf8_lossy(&outcome.stdout),
            "executing-metrics-cmd done"
        );

        match outcome.exit_kind() {
            ExitKind::Success => Some(outcome),
            ExitKind::NotReady => {
                info!(
                    output = %outcome.diagnostic_output(),
                    "Metrics command is not yet ready to emit metrics"
                );
                report.outcome = TickOutcome::Skipped;
                None
            }
            ExitKind::Failed(code) => {
                error!(
                    exit_code = ?code,
                    output = %outcome.diagnostic_output(),
                    "Metrics command exited with an error"
                );
                report.outcome = TickOutcome::Failure;
                None
            }
        }
    }

    async fn forward_batch(&self, report: &mut TickReport, batch: &DecodedBatch) {
        let origin = &self.config.origin;
        for metric in &batch.metrics {
            match self.forwarder.forward(metric, origin).await {
                Ok(()) => {
                    report.forwarded += 1;
                    debug!(metric = metric.name(), kind = metric.kind(), "Forwarded metric");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(metric = metric.name(), kind = metric.kind(), error = %e, "Failed to forward metric");
                }
            }
        }
    }

    fn enter(&self, report: &mut TickReport, state: TickState) {
        *self.state.write() = state;
        report.state_reached = state;
    }

    fn set_state(&self, state: TickState) {
        *self.state.write() = state;
    }
}

fn decode(report: &mut TickReport, outcome: &CollectionOutcome) -> Option<DecodedBatch> {
    match parser::decode(&outcome.stdout) {
        Ok(batch) => {
            report.decoded = batch.metrics.len();
            report.skipped = batch.skipped.len();
            for skipped in &batch.skipped {
                warn!(index = skipped.index(), reason = %skipped, "Skipping invalid metric record");
            }
            debug!(samples = report.decoded, skipped = report.skipped, "Decoded metrics");
            Some(batch)
        }
        Err(e) => {
            error!(
                error = %e,
                output = %String::from_utf8_lossy(&outcome.stdout),
                "Error parsing metrics command output"
            );
            report.outcome = TickOutcome::Failure;
            None
        }
    }
}

fn log_report(report: &TickReport) {
    match report.outcome {
        TickOutcome::Success | TickOutcome::Skipped => info!(
            tick = report.tick,
            outcome = ?report.outcome,
            forwarded = report.forwarded,
            elapsed = ?report.duration,
            "Tick complete"
        ),
        TickOutcome::Partial | TickOutcome::Failure => warn!(
            tick = report.tick,
            outcome = ?report.outcome,
            state = ?report.state_reached,
            decoded = report.decoded,
            skipped = report.skipped,
            forwarded = report.forwarded,
            failed = report.failed,
            elapsed = ?report.duration,
            "Tick complete"
        ),
    }
}
