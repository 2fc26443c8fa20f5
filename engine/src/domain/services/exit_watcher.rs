//! Exit watcher
//! Event-driven process exit monitoring using tokio tasks
//!
//! The OS exit callback never runs supervisor logic directly: the watcher
//! task awaits the exit handle and posts an event into the supervision
//! channel instead.

use crate::domain::ports::ProcessExitHandle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Event sent when the server process exits
#[derive(Debug, Clone)]
pub struct ServerExitEvent {
    pub pid: u32,
    pub exit_code: i32,
}

/// Watches spawned processes for exit and feeds the supervision loop
pub struct ExitWatcher {
    exit_tx: mpsc::UnboundedSender<ServerExitEvent>,
}

impl ExitWatcher {
    /// Returns the watcher and the receiver for exit events
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerExitEvent>) {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        (Self { exit_tx }, exit_rx)
    }

    /// Register a freshly spawned process for exit notification
    pub fn watch(&self, pid: u32, server_name: &str, exit_handle: ProcessExitHandle) {
        let server_name = server_name.to_string();
        let exit_tx = self.exit_tx.clone();

        tokio::spawn(async move {
            debug!(server = %server_name, pid = pid, "Monitoring process for exit");

            match exit_handle.await {
                Ok(exit_code) => {
                    info!(
                        server = %server_name,
                        pid = pid,
                        exit_code = exit_code,
                        "Server process exited"
                    );

                    if exit_tx.send(ServerExitEvent { pid, exit_code }).is_err() {
                        error!(
                            server = %server_name,
                            pid = pid,
                            "Failed to send exit event (channel closed)"
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        server = %server_name,
                        pid = pid,
                        error = %e,
                        "Error waiting for process exit, treating as failure"
                    );

                    let _ = exit_tx.send(ServerExitEvent { pid, exit_code: 1 });
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_watcher_delivers_exit_event() {
        let (watcher, mut exit_rx) = ExitWatcher::new();

        let exit_handle = Box::pin(async { Ok(42) });
        watcher.watch(1234, "test-server", exit_handle);

        let event = tokio::time::timeout(std::time::Duration::from_secs(1), exit_rx.recv())
            .await
            .expect("Timeout waiting for exit event")
            .expect("Channel closed");

        assert_eq!(event.pid, 1234);
        assert_eq!(event.exit_code, 42);
    }

    #[tokio::test]
    async fn test_wait_error_becomes_failure_exit() {
        let (watcher, mut exit_rx) = ExitWatcher::new();

        let exit_handle = Box::pin(async {
            Err(crate::domain::DomainError::SpawnFailed(
                "wait failed".to_string(),
            ))
        });
        watcher.watch(1234, "test-server", exit_handle);

        let event = tokio::time::timeout(std::time::Duration::from_secs(1), exit_rx.recv())
            .await
            .expect("Timeout waiting for exit event")
            .expect("Channel closed");

        assert_eq!(event.exit_code, 1);
    }
}
