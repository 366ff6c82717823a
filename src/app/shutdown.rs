use std::io;
use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal as unix_signal};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Turns SIGINT/SIGTERM into cancellation of the shared token.
#[derive(Debug)]
pub struct SignalHandler {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SignalHandler {
    /// Registers the signal listeners. Fails only if the OS refuses to
    /// install a handler.
    pub fn install(cancel: CancellationToken) -> io::Result<Self> {
        #[cfg(unix)]
        let mut sigterm = unix_signal(SignalKind::terminate())?;

        let token = cancel.clone();
        let task = tokio::spawn(async move {
            #[cfg(unix)]
            let terminate = async {
                sigterm.recv().await;
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                () = token.cancelled() => return,
                result = signal::ctrl_c() => match result {
                    Ok(()) => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
                    Err(err) => {
                        error!("Failed to listen for SIGINT: {}", err);
                        return;
                    }
                },
                () = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
            }

            token.cancel();
        });

        Ok(Self { cancel, task })
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Stops listening without cancelling the token.
    pub fn detach(self) {
        self.task.abort();
    }
}
