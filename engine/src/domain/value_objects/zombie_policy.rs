//! ZombiePolicy value object
//! Bounded wait before force-killing a process that ignored graceful signals

use crate::constants::{MAX_ZOMBIE_TIMEOUT_SECS, MIN_ZOMBIE_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Zombie-protection policy, consulted only during shutdown's final
/// escalation step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ZombiePolicy {
    enabled: bool,
    timeout_secs: u64,
}

impl ZombiePolicy {
    /// Build a policy; the timeout is clamped into 30-300 seconds
    pub fn new(enabled: bool, timeout_secs: u64) -> Self {
        Self {
            enabled,
            timeout_secs: timeout_secs.clamp(MIN_ZOMBIE_TIMEOUT_SECS, MAX_ZOMBIE_TIMEOUT_SECS),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ZombiePolicy {
    fn default() -> Self {
        Self::new(true, 120)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_clamped() {
        assert_eq!(ZombiePolicy::new(true, 5).timeout(), Duration::from_secs(30));
        assert_eq!(
            ZombiePolicy::new(true, 120).timeout(),
            Duration::from_secs(120)
        );
        assert_eq!(
            ZombiePolicy::new(true, 900).timeout(),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_default_enabled() {
        let policy = ZombiePolicy::default();
        assert!(policy.enabled());
        assert_eq!(policy.timeout(), Duration::from_secs(120));
    }
}
