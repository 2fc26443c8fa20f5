//! CrashContext value object
//! Crash-detection flags and restart-attempt bookkeeping

use crate::constants::{MAX_RESTART_ATTEMPTS, MIN_RESTART_ATTEMPTS};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Crash-handling policy plus the mutable attempt counter
///
/// The counter increments once per crash-triggered automatic restart and is
/// reset only by an explicit external signal: a caller-initiated start that
/// succeeded, or a confirmed recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrashContext {
    detection_enabled: bool,
    auto_restart: bool,
    max_attempts: u32,
    attempts: u32,
    last_crash_at: Option<SystemTime>,
}

impl CrashContext {
    /// Build a crash context; `max_attempts` is clamped into 1-10
    pub fn new(detection_enabled: bool, auto_restart: bool, max_attempts: u32) -> Self {
        Self {
            detection_enabled,
            auto_restart,
            max_attempts: max_attempts.clamp(MIN_RESTART_ATTEMPTS, MAX_RESTART_ATTEMPTS),
            attempts: 0,
            last_crash_at: None,
        }
    }

    pub fn detection_enabled(&self) -> bool {
        self.detection_enabled
    }

    pub fn auto_restart(&self) -> bool {
        self.auto_restart
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_crash_at(&self) -> Option<SystemTime> {
        self.last_crash_at
    }

    /// Whether an automatic restart may still be attempted
    pub fn can_attempt_restart(&self) -> bool {
        self.auto_restart && self.attempts < self.max_attempts
    }

    /// Record a crash timestamp
    pub fn record_crash(&mut self) {
        self.last_crash_at = Some(SystemTime::now());
    }

    /// Count one crash-triggered restart attempt; returns the new value
    pub fn record_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// External reset: start succeeded or recovery confirmed
    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
    }
}

impl Default for CrashContext {
    fn default() -> Self {
        Self::new(true, true, 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_attempts_clamped() {
        assert_eq!(CrashContext::new(true, true, 0).max_attempts(), 1);
        assert_eq!(CrashContext::new(true, true, 5).max_attempts(), 5);
        assert_eq!(CrashContext::new(true, true, 99).max_attempts(), 10);
    }

    #[test]
    fn test_attempts_bounded_by_max() {
        let mut ctx = CrashContext::new(true, true, 2);
        assert!(ctx.can_attempt_restart());
        assert_eq!(ctx.record_attempt(), 1);
        assert!(ctx.can_attempt_restart());
        assert_eq!(ctx.record_attempt(), 2);
        assert!(!ctx.can_attempt_restart());
    }

    #[test]
    fn test_auto_restart_disabled_blocks_attempts() {
        let ctx = CrashContext::new(true, false, 5);
        assert!(!ctx.can_attempt_restart());
    }

    #[test]
    fn test_reset_is_explicit() {
        let mut ctx = CrashContext::new(true, true, 3);
        ctx.record_attempt();
        ctx.record_attempt();
        assert_eq!(ctx.attempts(), 2);
        ctx.reset_attempts();
        assert_eq!(ctx.attempts(), 0);
        assert!(ctx.can_attempt_restart());
    }

    #[test]
    fn test_record_crash_stamps_time() {
        let mut ctx = CrashContext::default();
        assert!(ctx.last_crash_at().is_none());
        ctx.record_crash();
        assert!(ctx.last_crash_at().is_some());
    }
}
