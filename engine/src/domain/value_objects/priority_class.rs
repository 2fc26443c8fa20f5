//! PriorityClass value object
//! OS scheduling priority requested for the server process

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduling priority class applied to the spawned server process
///
/// Mapping to the actual OS mechanism (priority class on Windows, nice value
/// on Unix) is the process host's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityClass {
    Idle,
    BelowNormal,
    #[default]
    Normal,
    AboveNormal,
    High,
    Realtime,
}

impl PriorityClass {
    /// Parse a priority class from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Some(Self::Idle),
            "below-normal" | "belownormal" => Some(Self::BelowNormal),
            "normal" => Some(Self::Normal),
            "above-normal" | "abovenormal" => Some(Self::AboveNormal),
            "high" => Some(Self::High),
            "realtime" | "real-time" => Some(Self::Realtime),
            _ => None,
        }
    }
}

impl fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::BelowNormal => "below-normal",
            Self::Normal => "normal",
            Self::AboveNormal => "above-normal",
            Self::High => "high",
            Self::Realtime => "realtime",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for PriorityClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!(
                "Invalid priority class: '{}'. Valid options: idle, below-normal, normal, above-normal, high, realtime",
                s
            )
        })
    }
}
