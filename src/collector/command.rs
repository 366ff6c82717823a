use super::{CollectionOutcome, CollectorError, CommandRunner};
use bytes::Bytes;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant as Deadline;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default cap on captured stdout/stderr per stream.
const DEFAULT_MAX_OUTPUT_BYTES: u64 = 16 * 1024 * 1024;

/// How long to wait for output pipes to close after the child has exited.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(1);

enum Waited {
    Exited(io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Why output collection gave up before the pipes closed.
enum Abandoned {
    TimedOut,
    Cancelled,
    Failed(io::Error),
}

/// Runs the collector as a real child process.
///
/// On unix the child leads its own process group so that a timeout or
/// shutdown takes down anything it forked as well.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    max_output_bytes: u64,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_max_output_bytes(mut self, max_output_bytes: u64) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }

    fn spawn(&self, command: &str, args: &[String]) -> Result<Child, CollectorError> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        cmd.spawn().map_err(|source| CollectorError::Spawn {
            command: command.to_string(),
            source,
        })
    }
}

impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        command: &str,
        args: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<CollectionOutcome, CollectorError> {
        let start = Instant::now();
        let deadline = Deadline::now() + timeout;
        let mut child = self.spawn(command, args)?;
        let pid = child.id();

        let stdout_task = tokio::spawn(read_capped(child.stdout.take(), self.max_output_bytes));
        let stderr_task = tokio::spawn(read_capped(child.stderr.take(), self.max_output_bytes));

        let waited = tokio::select! {
            status = child.wait() => Waited::Exited(status),
            () = tokio::time::sleep_until(deadline) => Waited::TimedOut,
            () = cancel.cancelled() => Waited::Cancelled,
        };

        let status = match waited {
            Waited::Exited(status) => status,
            Waited::TimedOut => {
                terminate(&mut child, pid).await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(CollectorError::Timeout {
                    command: command.to_string(),
                    timeout,
                });
            }
            Waited::Cancelled => {
                terminate(&mut child, pid).await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(CollectorError::Cancelled);
            }
        };

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                terminate(&mut child, pid).await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(CollectorError::Io(e));
            }
        };

        let drained = match drain(stdout_task, pid, deadline, cancel).await {
            Ok(stdout) => drain(stderr_task, pid, deadline, cancel)
                .await
                .map(|stderr| (stdout, stderr)),
            Err(e) => {
                stderr_task.abort();
                Err(e)
            }
        };

        let (stdout, stderr) = match drained {
            Ok(output) => output,
            Err(Abandoned::TimedOut) => {
                warn!(
                    ?pid,
                    "collector output pipe held open past the timeout; discarding output"
                );
                return Err(CollectorError::Timeout {
                    command: command.to_string(),
                    timeout,
                });
            }
            Err(Abandoned::Cancelled) => return Err(CollectorError::Cancelled),
            Err(Abandoned::Failed(e)) => return Err(CollectorError::Io(e)),
        };

        Ok(CollectionOutcome {
            exit_code: status.code(),
            stdout,
            stderr,
            duration: start.elapsed(),
        })
    }
}

async fn read_capped<R>(reader: Option<R>, limit: u64) -> io::Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok(Bytes::new());
    };

    let mut buf = Vec::new();
    let mut limited = reader.take(limit);
    limited.read_to_end(&mut buf).await?;

    // Keep the pipe flowing so an overly chatty child cannot block on write
    let mut rest = limited.into_inner();
    let discarded = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await?;
    if discarded > 0 {
        warn!(
            limit_bytes = limit,
            discarded_bytes = discarded,
            "collector output exceeded capture limit; truncated"
        );
    }

    Ok(Bytes::from(buf))
}

/// Collects a reader task's output after the collector exited.
///
/// Leftover process group members still holding the pipe are killed after
/// a short grace period. Writers outside the group (a `setsid` grandchild,
/// say) cannot be reached, so the wait never runs past the collector's
/// deadline or a cancellation; the reader is aborted in that case.
async fn drain(
    mut task: JoinHandle<io::Result<Bytes>>,
    pid: Option<u32>,
    deadline: Deadline,
    cancel: &CancellationToken,
) -> Result<Bytes, Abandoned> {
    let grace = (Deadline::now() + OUTPUT_DRAIN_GRACE).min(deadline);
    tokio::select! {
        biased;
        joined = &mut task => return joined_output(joined),
        () = cancel.cancelled() => {
            kill_group(pid);
            task.abort();
            return Err(Abandoned::Cancelled);
        }
        () = tokio::time::sleep_until(grace) => {}
    }

    debug!(?pid, "output pipe still open after exit; killing process group");
    kill_group(pid);

    tokio::select! {
        biased;
        joined = &mut task => joined_output(joined),
        () = cancel.cancelled() => {
            task.abort();
            Err(Abandoned::Cancelled)
        }
        () = tokio::time::sleep_until(deadline) => {
            task.abort();
            Err(Abandoned::TimedOut)
        }
    }
}

fn joined_output(
    joined: Result<io::Result<Bytes>, tokio::task::JoinError>,
) -> Result<Bytes, Abandoned> {
    joined
        .map_err(|e| Abandoned::Failed(io::Error::other(e)))?
        .map_err(Abandoned::Failed)
}

/// Kills the child's process group and reaps the child.
async fn terminate(child: &mut Child, pid: Option<u32>) {
    kill_group(pid);
    if let Err(e) = child.kill().await {
        warn!(?pid, error = %e, "failed to kill collector process");
    }
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        // ESRCH just means the group is already gone
        debug!(pid, error = %e, "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let runner = ProcessRunner::new();
        let outcome = runner
            .run(
                "/bin/echo",
                &args(&["-n", "hello"]),
                Duration::from_secs(5),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(&outcome.stdout[..], b"hello");
        assert!(outcome.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_captures_stderr_separately() {
        let runner = ProcessRunner::new();
        let outcome = runner
            .run(
                "/bin/sh",
                &args(&["-c", "echo out; echo err 1>&2; exit 3"]),
                Duration::from_secs(5),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(&outcome.stdout[..], b"out\n");
        assert_eq!(&outcome.stderr[..], b"err\n");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let runner = ProcessRunner::new();
        let result = runner
            .run(
                "/your/system/wont/have/this/yet",
                &[],
                Duration::from_secs(5),
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(CollectorError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let runner = ProcessRunner::new();
        let start = Instant::now();
        let result = runner
            .run(
                "/bin/sleep",
                &args(&["30"]),
                Duration::from_millis(200),
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result, Err(CollectorError::Timeout { .. })));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_child() {
        let runner = ProcessRunner::new();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let result = runner
            .run("/bin/sleep", &args(&["30"]), Duration::from_secs(30), &cancel)
            .await;

        assert!(matches!(result, Err(CollectorError::Cancelled)));
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let runner = ProcessRunner::new().with_max_output_bytes(4);
        let outcome = runner
            .run(
                "/bin/echo",
                &args(&["-n", "0123456789"]),
                Duration::from_secs(5),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(&outcome.stdout[..], b"0123");
    }
}
