//! Signal handling for graceful shutdown

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{debug, error, info};

/// Resolves on Ctrl-C, SIGTERM (unix), or a termination request from the
/// control key
pub struct ShutdownSignal {
    termination: Arc<Notify>,
}

/// Cloneable handle the hook thread uses to ask the daemon to exit
#[derive(Clone)]
pub struct TerminationHandle {
    termination: Arc<Notify>,
}

impl TerminationHandle {
    /// Safe to call from any thread; a request made before anyone waits is
    /// remembered.
    pub fn request(&self) {
        self.termination.notify_one();
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            termination: Arc::new(Notify::new()),
        }
    }

    pub fn handle(&self) -> TerminationHandle {
        TerminationHandle {
            termination: Arc::clone(&self.termination),
        }
    }

    /// Wait for a shutdown signal
    pub async fn wait(&self) {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(?e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            _ = ctrl_c => {
                debug!("received Ctrl-C");
            }
            _ = terminate() => {
                debug!("received SIGTERM");
            }
            _ = self.termination.notified() => {
                info!("termination requested by control key");
            }
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!(?e, "failed to register SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn test_wait_pending_until_requested() {
        let shutdown = ShutdownSignal::new();
        let handle = shutdown.handle();
        let mut wait = task::spawn(shutdown.wait());

        assert_pending!(wait.poll());

        handle.request();
        assert!(wait.is_woken());
        assert_ready!(wait.poll());
    }

    #[tokio::test]
    async fn test_request_before_wait_is_remembered() {
        let shutdown = ShutdownSignal::new();
        shutdown.handle().request();

        let mut wait = task::spawn(shutdown.wait());
        assert_ready!(wait.poll());
    }

    #[tokio::test]
    async fn test_request_from_another_thread() {
        let shutdown = ShutdownSignal::new();
        let handle = shutdown.handle();

        std::thread::spawn(move || handle.request());

        tokio_test::assert_ok!(tokio::time::timeout(Duration::from_secs(1), shutdown.wait()).await);
    }
}
