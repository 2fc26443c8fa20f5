//! AffinityMask value object
//! Bitmask selecting which CPU cores the server process may run on

use crate::domain::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// CPU-affinity mask built from a validated comma list of core indices
///
/// The mask is limited to 64 cores, which is also the widest mask the OS
/// affinity calls accept for a single processor group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AffinityMask(u64);

impl AffinityMask {
    /// Parse an affinity specification: a comma list of distinct non-negative
    /// core indices below `core_count`, or an empty string meaning "no
    /// explicit mask".
    ///
    /// Returns `Ok(None)` for the empty specification.
    pub fn parse(spec: &str, core_count: usize) -> Result<Option<Self>> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Ok(None);
        }

        let mut bits: u64 = 0;
        for part in spec.split(',') {
            let part = part.trim();
            let core: usize = part.parse().map_err(|_| {
                DomainError::InvalidAffinity(format!("'{}' is not a core index", part))
            })?;

            if core >= core_count {
                return Err(DomainError::InvalidAffinity(format!(
                    "core index {} out of range (machine has {} cores)",
                    core, core_count
                )));
            }
            if core >= 64 {
                return Err(DomainError::InvalidAffinity(format!(
                    "core index {} exceeds the 64-core mask limit",
                    core
                )));
            }
            if bits & (1u64 << core) != 0 {
                return Err(DomainError::InvalidAffinity(format!(
                    "duplicate core index {}",
                    core
                )));
            }

            bits |= 1u64 << core;
        }

        Ok(Some(Self(bits)))
    }

    /// Raw bitmask value
    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Core indices present in the mask, ascending
    pub fn cores(&self) -> Vec<usize> {
        (0..64).filter(|i| self.0 & (1u64 << i) != 0).collect()
    }
}

impl fmt::Display for AffinityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cores: Vec<String> = self.cores().iter().map(|c| c.to_string()).collect();
        write!(f, "{}", cores.join(","))
    }
}
