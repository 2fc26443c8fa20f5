//! LaunchParameters value object
//! Validated launch parameter set, immutable once constructed

use crate::constants::{MAX_GAME_PORT, MIN_GAME_PORT};
use crate::domain::{AffinityMask, DomainError, PriorityClass, Result};
use serde::{Deserialize, Serialize};

/// Validated parameters for launching the server process
///
/// The last successfully used set is retained by the supervisor so an
/// automatic restart reuses exactly what the operator launched with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchParameters {
    port: u16,
    extra_args: Option<String>,
    priority: PriorityClass,
    affinity: Option<AffinityMask>,
    use_all_cores: bool,
}

impl LaunchParameters {
    /// Validate and build a parameter set against the actual core count of
    /// this machine.
    pub fn new(
        port: u32,
        extra_args: Option<String>,
        priority: PriorityClass,
        affinity_spec: &str,
        use_all_cores: bool,
    ) -> Result<Self> {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_core_count(port, extra_args, priority, affinity_spec, use_all_cores, cores)
    }

    /// Validate against an explicit core count
    pub fn with_core_count(
        port: u32,
        extra_args: Option<String>,
        priority: PriorityClass,
        affinity_spec: &str,
        use_all_cores: bool,
        core_count: usize,
    ) -> Result<Self> {
        if !(MIN_GAME_PORT..=MAX_GAME_PORT).contains(&port) {
            return Err(DomainError::InvalidPort(port));
        }

        let affinity = AffinityMask::parse(affinity_spec, core_count)?;

        let extra_args = extra_args.and_then(|s| {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        });

        Ok(Self {
            port: port as u16,
            extra_args,
            priority,
            affinity,
            use_all_cores,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn extra_args(&self) -> Option<&str> {
        self.extra_args.as_deref()
    }

    pub fn priority(&self) -> PriorityClass {
        self.priority
    }

    pub fn use_all_cores(&self) -> bool {
        self.use_all_cores
    }

    /// Affinity mask to apply, honouring the use-all-cores override
    pub fn effective_affinity(&self) -> Option<AffinityMask> {
        if self.use_all_cores {
            None
        } else {
            self.affinity
        }
    }

    /// Compose the server command line embedding the validated port and any
    /// operator-supplied extra text.
    pub fn command_line(&self) -> Vec<String> {
        let mut args = vec![format!("-Port={}", self.port), "-log".to_string()];
        if let Some(extra) = &self.extra_args {
            args.extend(extra.split_whitespace().map(|s| s.to_string()));
        }
        args
    }
}
