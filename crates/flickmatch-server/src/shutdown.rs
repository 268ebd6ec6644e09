//! Graceful shutdown coordination via `CancellationToken`.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default time to wait for background tasks before giving up on them.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the server-wide cancellation token and the background tasks that
/// must finish before the process exits.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl ShutdownCoordinator {
    /// Create a new coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Register a task to be awaited by [`graceful_shutdown`](Self::graceful_shutdown).
    pub fn track(&self, name: &'static str, handle: JoinHandle<()>) {
        self.tasks.lock().push((name, handle));
    }

    /// Number of tracked tasks.
    pub fn tracked(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Signal every task to stop.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token, then wait up to `timeout` for every tracked task.
    /// Tasks still running after the deadline are aborted.
    pub async fn graceful_shutdown(&self, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        self.shutdown();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        info!(
            task_count = tasks.len(),
            timeout_secs = timeout.as_secs(),
            "waiting for tasks to complete"
        );

        let deadline = tokio::time::Instant::now() + timeout;
        for (name, handle) in tasks {
            let abort = handle.abort_handle();
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancelled() => {}
                Ok(Err(e)) => warn!(task = name, error = %e, "task panicked during shutdown"),
                Err(_) => {
                    warn!(task = name, "task did not stop in time, aborting");
                    abort.abort();
                }
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_not_shutting_down() {
        let coord = ShutdownCoordinator::new();
        assert!(!coord.is_shutting_down());
        assert_eq!(coord.tracked(), 0);
    }

    #[test]
    fn token_propagation() {
        let coord = ShutdownCoordinator::new();
        let t1 = coord.token();
        let t2 = coord.token();
        coord.shutdown();
        coord.shutdown();
        assert!(t1.is_cancelled());
        assert!(t2.is_cancelled());
        assert!(coord.is_shutting_down());
    }

    #[tokio::test]
    async fn graceful_shutdown_awaits_tracked_tasks() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        coord.track(
            "waiter",
            tokio::spawn(async move {
                token.cancelled().await;
                let _ = done_tx.send(());
            }),
        );
        assert_eq!(coord.tracked(), 1);

        coord.graceful_shutdown(None).await;
        assert!(done_rx.await.is_ok());
        assert_eq!(coord.tracked(), 0);
    }

    #[tokio::test]
    async fn graceful_shutdown_aborts_stragglers() {
        let coord = ShutdownCoordinator::new();
        coord.track(
            "sleeper",
            tokio::spawn(async {
                tokio::time::sleep(Duration::from_secs(300)).await;
            }),
        );
        let started = std::time::Instant::now();
        coord
            .graceful_shutdown(Some(Duration::from_millis(100)))
            .await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(coord.is_shutting_down());
    }
}
