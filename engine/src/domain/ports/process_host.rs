//! ProcessHost port
//! OS capability interface for spawning and terminating the server process
//!
//! The state machine never touches OS primitives directly; a non-Windows
//! target substitutes an equivalent mechanism (e.g. a process-group signal
//! instead of a console ctrl event) without changing the supervisor.

use crate::domain::{AffinityMask, DomainError, PriorityClass};
use async_trait::async_trait;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

/// Configuration for spawning the server process
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl SpawnConfig {
    pub fn new(executable: PathBuf, args: Vec<String>) -> Self {
        let working_dir = executable.parent().map(|p| p.to_path_buf());
        Self {
            executable,
            args,
            working_dir,
        }
    }
}

/// Handle for monitoring process exit
/// Resolves with the exit code once the OS reports termination - no polling
pub type ProcessExitHandle = Pin<Box<dyn Future<Output = Result<i32, DomainError>> + Send>>;

/// Result of spawning the server process
pub struct SpawnResult {
    pub pid: u32,
    /// None means the process cannot be monitored for exit
    pub exit_handle: Option<ProcessExitHandle>,
}

impl std::fmt::Debug for SpawnResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnResult")
            .field("pid", &self.pid)
            .field("exit_handle", &self.exit_handle.is_some())
            .finish()
    }
}

/// Port for OS process operations
#[async_trait]
pub trait ProcessHost: Send + Sync {
    /// Spawn the server process
    async fn spawn(&self, config: SpawnConfig) -> Result<SpawnResult, DomainError>;

    /// Apply a scheduling priority class to a running process
    async fn set_priority(&self, pid: u32, priority: PriorityClass) -> Result<(), DomainError>;

    /// Apply a CPU-affinity mask to a running process
    async fn set_affinity(&self, pid: u32, mask: AffinityMask) -> Result<(), DomainError>;

    /// Send the graceful-termination control signal (SIGTERM / console ctrl
    /// event) without waiting for exit
    async fn signal_graceful(&self, pid: u32) -> Result<(), DomainError>;

    /// Forcefully kill a process
    async fn force_kill(&self, pid: u32) -> Result<(), DomainError>;

    /// Check if a process is still running
    async fn is_running(&self, pid: u32) -> Result<bool, DomainError>;

    /// Enumerate live processes sharing the given image name
    ///
    /// Best-effort against a racy external namespace; used for adoption of a
    /// pre-existing server and for stray sweeps, not as a correctness
    /// guarantee.
    async fn find_by_image_name(&self, image_name: &str) -> Result<Vec<u32>, DomainError>;
}
