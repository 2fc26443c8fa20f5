//! ServerState value object
//! Represents the lifecycle state of the managed game server

use serde::{Deserialize, Serialize};
use std::fmt;

/// The state of the managed server process
///
/// Exactly one current value exists at a time, owned by the supervisor and
/// mutated only inside its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ServerState {
    /// Server files are not present on disk
    #[default]
    NotInstalled,

    /// An external installer is provisioning the server files
    Installing,

    /// Server is installed but no process is running
    Stopped,

    /// Launch accepted, process is being spawned
    Starting,

    /// Server process is running normally
    Running,

    /// An orderly shutdown sequence is in progress
    Stopping,

    /// Server process terminated unexpectedly and was not (or could not be)
    /// restarted
    Crashed,
}

impl ServerState {
    /// Check if a server process is live (or about to be)
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ServerState::Starting | ServerState::Running | ServerState::Stopping
        )
    }

    /// Check if a new launch may be attempted from this state
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            ServerState::NotInstalled | ServerState::Stopped | ServerState::Crashed
        )
    }

    /// Validate state transition
    pub fn can_transition_to(&self, new_state: ServerState) -> bool {
        use ServerState::*;

        match (self, new_state) {
            // Installation is driven by an external collaborator
            (NotInstalled, Installing) => true,
            (Installing, Stopped) => true,
            (Installing, NotInstalled) => true, // Install failed or aborted
            (Stopped, Installing) => true,      // Update / verify

            // Launch
            (NotInstalled, Starting) => true, // Rejected before spawn, but the attempt is legal
            (Stopped, Starting) => true,
            (Crashed, Starting) => true, // Manual or automatic restart
            (Starting, Running) => true,

            // Orderly shutdown
            (Starting, Stopping) => true,
            (Running, Stopping) => true,

            // Unexpected exit
            (Starting, Crashed) => true,
            (Running, Crashed) => true,

            // Stop always converges to Stopped, from any state (no-op included)
            (_, Stopped) => true,

            // Same state is always allowed
            (a, b) if *a == b => true,

            // Everything else is invalid
            _ => false,
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::NotInstalled => write!(f, "not-installed"),
            ServerState::Installing => write!(f, "installing"),
            ServerState::Stopped => write!(f, "stopped"),
            ServerState::Starting => write!(f, "starting"),
            ServerState::Running => write!(f, "running"),
            ServerState::Stopping => write!(f, "stopping"),
            ServerState::Crashed => write!(f, "crashed"),
        }
    }
}
