//! Recovery monitor
//! Confirms a restarted server actually finished booting
//!
//! Runs only after an automatic restart. Tails the server's own log for a
//! readiness marker within a bounded window; the outcome is fed back to the
//! supervisor, which resets the restart-attempt counter on success. On
//! timeout it warns and does nothing else - a false negative must not kill a
//! server that may simply be booting slowly.

use crate::constants::{DEFAULT_READY_MARKER, RECOVERY_POLL_MS, RECOVERY_WINDOW_SECS};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Result of a readiness search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The readiness marker appeared within the window
    Ready,
    /// The window elapsed without the marker
    TimedOut,
}

/// Tuning for the readiness search
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Marker searched for case-insensitively in the server log
    pub marker: String,
    /// Overall bound covering both log-file creation and the marker search
    pub window: Duration,
    /// Backoff when no new line is available
    pub poll: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_READY_MARKER.to_string(),
            window: Duration::from_secs(RECOVERY_WINDOW_SECS),
            poll: Duration::from_millis(RECOVERY_POLL_MS),
        }
    }
}

/// Tails the server log for the readiness marker
pub struct RecoveryMonitor {
    log_path: PathBuf,
    config: RecoveryConfig,
}

impl RecoveryMonitor {
    pub fn new(log_path: PathBuf, config: RecoveryConfig) -> Self {
        Self { log_path, config }
    }

    /// Run the bounded readiness search to completion
    ///
    /// The server recreates its log file on boot, so reading from the start
    /// of the file only sees output of the current process.
    pub async fn run(&self) -> RecoveryOutcome {
        let deadline = Instant::now() + self.config.window;
        let marker = self.config.marker.to_lowercase();

        debug!(
            log = %self.log_path.display(),
            marker = %self.config.marker,
            window_secs = self.config.window.as_secs(),
            "Waiting for server readiness"
        );

        // Phase 1: wait for the log file to appear
        loop {
            if tokio::fs::metadata(&self.log_path).await.is_ok() {
                break;
            }
            if Instant::now() >= deadline {
                warn!(
                    log = %self.log_path.display(),
                    "Server log never appeared within the recovery window"
                );
                return RecoveryOutcome::TimedOut;
            }
            sleep(self.config.poll).await;
        }

        // Phase 2: tail lines as they are appended
        let file = match tokio::fs::File::open(&self.log_path).await {
            Ok(f) => f,
            Err(e) => {
                warn!(
                    log = %self.log_path.display(),
                    error = %e,
                    "Failed to open server log for readiness search"
                );
                return RecoveryOutcome::TimedOut;
            }
        };
        let mut reader = BufReader::new(file);
        let mut line = String::new();

        loop {
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    if Instant::now() >= deadline {
                        warn!(
                            log = %self.log_path.display(),
                            marker = %self.config.marker,
                            "Readiness marker did not appear within the recovery window"
                        );
                        return RecoveryOutcome::TimedOut;
                    }
                    sleep(self.config.poll).await;
                }
                Ok(_) => {
                    if line.to_lowercase().contains(&marker) {
                        info!(
                            log = %self.log_path.display(),
                            "Server reported readiness"
                        );
                        return RecoveryOutcome::Ready;
                    }
                    if line.ends_with('\n') {
                        line.clear();
                    } else if Instant::now() >= deadline {
                        // Partial trailing line and out of time
                        return RecoveryOutcome::TimedOut;
                    }
                    // Partial line: keep the buffer, read_line appends the rest
                }
                Err(e) => {
                    warn!(
                        log = %self.log_path.display(),
                        error = %e,
                        "Error reading server log"
                    );
                    if Instant::now() >= deadline {
                        return RecoveryOutcome::TimedOut;
                    }
                    line.clear();
                    sleep(self.config.poll).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fast_config(marker: &str, window_ms: u64) -> RecoveryConfig {
        RecoveryConfig {
            marker: marker.to_string(),
            window: Duration::from_millis(window_ms),
            poll: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_marker_already_present() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("server.log");
        std::fs::write(&log, "boot line\nEngine is initialized\nmore\n").unwrap();

        let monitor = RecoveryMonitor::new(log, fast_config("engine is initialized", 2000));
        assert_eq!(monitor.run().await, RecoveryOutcome::Ready);
    }

    #[tokio::test]
    async fn test_marker_matched_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("server.log");
        std::fs::write(&log, "ENGINE IS INITIALIZED\n").unwrap();

        let monitor = RecoveryMonitor::new(log, fast_config("Engine Is Initialized", 2000));
        assert_eq!(monitor.run().await, RecoveryOutcome::Ready);
    }

    #[tokio::test]
    async fn test_marker_appended_while_tailing() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("server.log");
        std::fs::write(&log, "starting up\n").unwrap();

        let log_clone = log.clone();
        let writer = tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            let mut f = std::fs::OpenOptions::new()
                .append(true)
                .open(&log_clone)
                .unwrap();
            writeln!(f, "Engine is initialized").unwrap();
        });

        let monitor = RecoveryMonitor::new(log, fast_config("engine is initialized", 5000));
        assert_eq!(monitor.run().await, RecoveryOutcome::Ready);
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_file_never_created_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("missing.log");

        let monitor = RecoveryMonitor::new(log, fast_config("ready", 100));
        assert_eq!(monitor.run().await, RecoveryOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_marker_absent_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("server.log");
        std::fs::write(&log, "no readiness here\n").unwrap();

        let monitor = RecoveryMonitor::new(log, fast_config("engine is initialized", 150));
        assert_eq!(monitor.run().await, RecoveryOutcome::TimedOut);
    }
}
