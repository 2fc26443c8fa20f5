//! Domain-level errors
//! These represent supervision rule violations, not infrastructure failures

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum DomainError {
    // Validation errors - rejected before any side effect
    #[error("Invalid game port {0} (must lie in 1024-65535)")]
    InvalidPort(u32),

    #[error("Invalid CPU affinity: {0}")]
    InvalidAffinity(String),

    #[error("Server executable not found at '{0}'")]
    ExecutableMissing(String),

    // Process lifecycle errors
    #[error("No process matching image '{0}' found")]
    ProcessNotFound(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Failed to spawn server process: {0}")]
    SpawnFailed(String),

    // Protocol errors
    #[error("RCON authentication rejected by server")]
    AuthenticationFailed,

    #[error("RCON connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Timed out while {0}")]
    Timeout(String),

    // OS apply errors - downgraded to warnings by the supervisor
    #[error("Failed to apply {what}: {reason}")]
    OsApplyFailure { what: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
