//! Notifier port
//! Outbound notifications about crashes and restarts
//!
//! Implementations post pre-formatted messages to an external channel (e.g. a
//! webhook). All methods return a delivery success flag and must never fail:
//! notification problems are the implementation's to swallow and log.

use async_trait::async_trait;
use std::time::{Duration, SystemTime};

#[async_trait]
pub trait Notifier: Send + Sync {
    /// The server process terminated unexpectedly
    async fn send_crash_notification(
        &self,
        server_name: &str,
        crash_time: SystemTime,
        exit_code: Option<i32>,
        uptime: Option<Duration>,
    ) -> bool;

    /// A restart is being attempted (`is_auto` distinguishes crash-triggered
    /// restarts from operator-initiated ones)
    async fn send_restart_notification(
        &self,
        server_name: &str,
        is_auto: bool,
        attempt: u32,
        max_attempts: u32,
    ) -> bool;

    /// A restarted server confirmed readiness
    async fn send_auto_restart_success(&self, server_name: &str, attempt: u32) -> bool;

    /// Automatic recovery gave up (attempts exhausted or respawn failed)
    async fn send_auto_restart_failure(&self, server_name: &str, max_attempts: u32) -> bool;
}

/// No-op notifier for wiring without an outbound channel
#[derive(Debug, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send_crash_notification(
        &self,
        _server_name: &str,
        _crash_time: SystemTime,
        _exit_code: Option<i32>,
        _uptime: Option<Duration>,
    ) -> bool {
        true
    }

    async fn send_restart_notification(
        &self,
        _server_name: &str,
        _is_auto: bool,
        _attempt: u32,
        _max_attempts: u32,
    ) -> bool {
        true
    }

    async fn send_auto_restart_success(&self, _server_name: &str, _attempt: u32) -> bool {
        true
    }

    async fn send_auto_restart_failure(&self, _server_name: &str, _max_attempts: u32) -> bool {
        true
    }
}
