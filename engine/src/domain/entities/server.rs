//! GameServer entity
//! Core domain aggregate for the one managed server process

use crate::domain::{
    CrashContext, DomainError, LaunchParameters, Result, ServerState, ZombiePolicy,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Where the server lives on disk and how to recognise its process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerLayout {
    /// Display name used in notifications and logs
    pub name: String,
    /// Full path to the server executable
    pub executable: PathBuf,
    /// Well-known process image name, used for adoption and stray sweeps
    pub image_name: String,
    /// Path of the server's own log file, tailed by the recovery monitor
    pub server_log: PathBuf,
}

/// GameServer - the aggregate owning the lifecycle state machine
///
/// At most one live process handle exists at a time: `pid` is set on a
/// successful spawn and cleared once the exit is confirmed or the process is
/// killed. All mutation happens through the supervisor's lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameServer {
    layout: ServerLayout,
    state: ServerState,
    pid: Option<u32>,
    started_at: Option<SystemTime>,
    exit_code: Option<i32>,
    last_params: Option<LaunchParameters>,
    crash: CrashContext,
    zombie: ZombiePolicy,
}

impl GameServer {
    pub fn new(layout: ServerLayout, crash: CrashContext, zombie: ZombiePolicy) -> Self {
        let state = if layout.executable.exists() {
            ServerState::Stopped
        } else {
            ServerState::NotInstalled
        };
        Self {
            layout,
            state,
            pid: None,
            started_at: None,
            exit_code: None,
            last_params: None,
            crash,
            zombie,
        }
    }

    // ===== Accessors =====

    pub fn name(&self) -> &str {
        &self.layout.name
    }

    pub fn executable(&self) -> &Path {
        &self.layout.executable
    }

    pub fn image_name(&self) -> &str {
        &self.layout.image_name
    }

    pub fn server_log(&self) -> &Path {
        &self.layout.server_log
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn last_params(&self) -> Option<&LaunchParameters> {
        self.last_params.as_ref()
    }

    pub fn crash(&self) -> &CrashContext {
        &self.crash
    }

    pub fn crash_mut(&mut self) -> &mut CrashContext {
        &mut self.crash
    }

    pub fn zombie(&self) -> ZombiePolicy {
        self.zombie
    }

    /// Uptime of the current (or just-exited) process handle
    pub fn uptime(&self) -> Option<Duration> {
        self.started_at.and_then(|t| t.elapsed().ok())
    }

    // ===== Business Logic: State Transitions =====

    fn transition(&mut self, to: ServerState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(DomainError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        Ok(())
    }

    /// An external installer started provisioning the server files
    pub fn mark_installing(&mut self) -> Result<()> {
        self.transition(ServerState::Installing)
    }

    /// Installation finished; the server is on disk and stopped
    pub fn mark_installed(&mut self) -> Result<()> {
        self.transition(ServerState::Stopped)
    }

    /// Launch was validated and the spawn is underway
    pub fn mark_starting(&mut self) -> Result<()> {
        self.transition(ServerState::Starting)?;
        self.exit_code = None;
        Ok(())
    }

    /// Spawn succeeded; capture the handle and its start timestamp
    pub fn mark_running(&mut self, pid: u32, params: LaunchParameters) -> Result<()> {
        self.transition(ServerState::Running)?;
        self.pid = Some(pid);
        self.started_at = Some(SystemTime::now());
        self.last_params = Some(params);
        Ok(())
    }

    /// The orderly shutdown sequence has begun
    pub fn mark_stopping(&mut self) -> Result<()> {
        self.transition(ServerState::Stopping)
    }

    /// Shutdown converged; the handle is disposed
    pub fn mark_stopped(&mut self) -> Result<()> {
        self.transition(ServerState::Stopped)?;
        self.pid = None;
        Ok(())
    }

    /// Unexpected exit was detected; records the best-effort exit code
    pub fn mark_crashed(&mut self, exit_code: Option<i32>) -> Result<()> {
        self.transition(ServerState::Crashed)?;
        self.exit_code = exit_code;
        self.pid = None;
        self.crash.record_crash();
        Ok(())
    }

    // ===== Business Logic: Queries =====

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn can_start(&self) -> bool {
        self.state.can_start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriorityClass;

    fn layout() -> ServerLayout {
        ServerLayout {
            name: "test-server".to_string(),
            executable: PathBuf::from("/nonexistent/TestServer"),
            image_name: "TestServer".to_string(),
            server_log: PathBuf::from("/tmp/TestServer.log"),
        }
    }

    fn params() -> LaunchParameters {
        LaunchParameters::with_core_count(7777, None, PriorityClass::Normal, "", true, 8).unwrap()
    }

    fn running_server() -> GameServer {
        let mut server = GameServer::new(layout(), CrashContext::default(), ZombiePolicy::default());
        // Missing executable leaves the server in NotInstalled
        server.mark_starting().unwrap();
        server.mark_running(4242, params()).unwrap();
        server
    }

    #[test]
    fn test_missing_executable_starts_not_installed() {
        let server = GameServer::new(layout(), CrashContext::default(), ZombiePolicy::default());
        assert_eq!(server.state(), ServerState::NotInstalled);
    }

    #[test]
    fn test_running_tracks_handle() {
        let server = running_server();
        assert_eq!(server.state(), ServerState::Running);
        assert_eq!(server.pid(), Some(4242));
        assert!(server.started_at().is_some());
        assert!(server.last_params().is_some());
    }

    #[test]
    fn test_stop_cycle_clears_handle() {
        let mut server = running_server();
        server.mark_stopping().unwrap();
        server.mark_stopped().unwrap();
        assert_eq!(server.state(), ServerState::Stopped);
        assert_eq!(server.pid(), None);
        // Launch parameters are retained for restart reuse
        assert!(server.last_params().is_some());
    }

    #[test]
    fn test_crash_records_exit_code() {
        let mut server = running_server();
        server.mark_crashed(Some(1)).unwrap();
        assert_eq!(server.state(), ServerState::Crashed);
        assert_eq!(server.exit_code(), Some(1));
        assert_eq!(server.pid(), None);
        assert!(server.crash().last_crash_at().is_some());
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut server = running_server();
        let err = server.mark_starting().unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
        assert_eq!(server.state(), ServerState::Running);
    }

    #[test]
    fn test_install_cycle() {
        let mut server = GameServer::new(layout(), CrashContext::default(), ZombiePolicy::default());
        server.mark_installing().unwrap();
        assert_eq!(server.state(), ServerState::Installing);
        server.mark_installed().unwrap();
        assert_eq!(server.state(), ServerState::Stopped);
    }
}
