//! Server Supervisor
//! Single coordinator for the managed server's lifecycle:
//! - validated launch with OS tuning (priority, affinity)
//! - event-driven crash detection via the exit watcher (no polling)
//! - bounded automatic restarts with recovery confirmation
//! - orderly multi-stage shutdown with protocol-level save and escalation

use crate::constants::{
    GRACEFUL_ATTEMPTS, GRACEFUL_WAIT_SECS, RESTART_COOLDOWN_SECS, SAVE_SETTLE_SECS,
};
use crate::domain::entities::GameServer;
use crate::domain::ports::{Notifier, ProcessExitHandle, ProcessHost, SpawnConfig};
use crate::domain::services::{
    ExitWatcher, RecoveryConfig, RecoveryMonitor, RecoveryOutcome, ServerExitEvent,
};
use crate::domain::{DomainError, LaunchParameters, Result, ServerState};
use crate::rcon::{RconClient, RconResponse};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Fixed durations used by the shutdown and restart sequences
///
/// Defaults follow the shipped behaviour; tests shrink them.
#[derive(Debug, Clone)]
pub struct SupervisorTiming {
    /// Wait for exit after each graceful-termination signal
    pub graceful_wait: Duration,
    /// Number of graceful-termination attempts ("double tap")
    pub graceful_attempts: u32,
    /// Settle delay after an acknowledged save
    pub save_settle: Duration,
    /// Cool-down before an automatic respawn
    pub restart_cooldown: Duration,
    /// Poll interval while waiting for a process to disappear
    pub exit_poll: Duration,
}

impl Default for SupervisorTiming {
    fn default() -> Self {
        Self {
            graceful_wait: Duration::from_secs(GRACEFUL_WAIT_SECS),
            graceful_attempts: GRACEFUL_ATTEMPTS,
            save_settle: Duration::from_secs(SAVE_SETTLE_SECS),
            restart_cooldown: Duration::from_secs(RESTART_COOLDOWN_SECS),
            exit_poll: Duration::from_millis(250),
        }
    }
}

/// Outcome of snapshotting an exit event under the lock
enum ExitDecision {
    /// Stale handle or an exit already owned by the shutdown sequence
    Ignore,
    /// Detection disabled: the exit was folded into Stopped
    DetectionDisabled { name: String },
    /// A crash to handle; `attempt` is set when a restart may proceed
    Crashed {
        name: String,
        uptime: Option<Duration>,
        attempt: Option<u32>,
        max_attempts: u32,
    },
}

/// Server Supervisor
///
/// Owns the one live process handle and the state machine. A single coarse
/// lock guards the aggregate; it is held only for short critical sections,
/// never across a bounded wait.
pub struct ServerSupervisor {
    server: Arc<Mutex<GameServer>>,
    host: Arc<dyn ProcessHost>,
    notifier: Arc<dyn Notifier>,
    watcher: ExitWatcher,
    state_tx: watch::Sender<ServerState>,
    timing: SupervisorTiming,
    recovery: RecoveryConfig,
}

impl ServerSupervisor {
    /// Create a supervisor around a server aggregate
    /// Returns the supervisor and the exit-event receiver to feed [`run`]
    pub fn new(
        server: GameServer,
        host: Arc<dyn ProcessHost>,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, mpsc::UnboundedReceiver<ServerExitEvent>) {
        let (watcher, exit_rx) = ExitWatcher::new();
        let (state_tx, _) = watch::channel(server.state());
        (
            Self {
                server: Arc::new(Mutex::new(server)),
                host,
                notifier,
                watcher,
                state_tx,
                timing: SupervisorTiming::default(),
                recovery: RecoveryConfig::default(),
            },
            exit_rx,
        )
    }

    pub fn with_timing(mut self, timing: SupervisorTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryConfig) -> Self {
        self.recovery = recovery;
        self
    }

    /// Observe state changes; the receiver always holds the latest state
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state_tx.subscribe()
    }

    pub async fn state(&self) -> ServerState {
        self.server.lock().await.state()
    }

    pub async fn pid(&self) -> Option<u32> {
        self.server.lock().await.pid()
    }

    pub async fn uptime(&self) -> Option<Duration> {
        self.server.lock().await.uptime()
    }

    pub async fn restart_attempts(&self) -> u32 {
        self.server.lock().await.crash().attempts()
    }

    /// External reset of the restart-attempt counter
    pub async fn reset_crash_counter(&self) {
        self.server.lock().await.crash_mut().reset_attempts();
    }

    fn broadcast(&self, state: ServerState) {
        let _ = self.state_tx.send(state);
    }

    // ===== Start =====

    /// Validate and launch the server process
    ///
    /// Rejects before any side effect if the executable is absent (the port
    /// and affinity were already validated when `params` was built). Stray
    /// processes sharing the image name are terminated first so at most one
    /// listener owns the game port.
    pub async fn start(&self, params: LaunchParameters) -> Result<()> {
        let (executable, image_name, name) = {
            let server = self.server.lock().await;
            if server.is_active() {
                return Err(DomainError::InvalidStateTransition {
                    from: server.state().to_string(),
                    to: ServerState::Starting.to_string(),
                });
            }
            (
                server.executable().to_path_buf(),
                server.image_name().to_string(),
                server.name().to_string(),
            )
        };

        if !executable.exists() {
            return Err(DomainError::ExecutableMissing(
                executable.display().to_string(),
            ));
        }

        self.sweep_strays(&image_name).await;

        {
            let mut server = self.server.lock().await;
            server.mark_starting()?;
            self.broadcast(server.state());
        }

        match self.spawn_with_params(&executable, &params, &name).await {
            Ok((pid, exit_handle)) => {
                {
                    let mut server = self.server.lock().await;
                    server.mark_running(pid, params)?;
                    // Caller-initiated start succeeded: external counter reset
                    server.crash_mut().reset_attempts();
                    self.broadcast(server.state());
                }
                if let Some(handle) = exit_handle {
                    self.watcher.watch(pid, &name, handle);
                } else {
                    warn!(
                        server = %name,
                        pid = pid,
                        "No exit handle for spawned process, crash detection degraded"
                    );
                }
                info!(server = %name, pid = pid, "Server started");
                Ok(())
            }
            Err(e) => {
                let mut server = self.server.lock().await;
                if let Err(te) = server.mark_stopped() {
                    error!(server = %name, error = %te, "Failed to record aborted start");
                }
                self.broadcast(server.state());
                Err(e)
            }
        }
    }

    /// Spawn and apply OS tuning; priority/affinity failures are warnings
    async fn spawn_with_params(
        &self,
        executable: &Path,
        params: &LaunchParameters,
        name: &str,
    ) -> Result<(u32, Option<ProcessExitHandle>)> {
        let config = SpawnConfig::new(executable.to_path_buf(), params.command_line());
        let result = self.host.spawn(config).await?;
        let pid = result.pid;

        if let Err(e) = self.host.set_priority(pid, params.priority()).await {
            warn!(server = %name, pid = pid, error = %e, "Could not apply priority class");
        }
        if let Some(mask) = params.effective_affinity() {
            if let Err(e) = self.host.set_affinity(pid, mask).await {
                warn!(server = %name, pid = pid, error = %e, "Could not apply CPU affinity");
            }
        }

        Ok((pid, result.exit_handle))
    }

    // ===== Stop =====

    /// Orderly multi-stage shutdown; idempotent, always converges to Stopped
    ///
    /// When an RCON client is supplied, a world save is issued first and
    /// given a short settle delay if acknowledged - best effort, the rest of
    /// the sequence proceeds either way.
    pub async fn stop(&self, rcon: Option<&RconClient>) -> Result<()> {
        let (image_name, name, zombie, own_pid) = {
            let mut server = self.server.lock().await;
            if matches!(server.state(), ServerState::Starting | ServerState::Running) {
                server.mark_stopping()?;
                self.broadcast(server.state());
            }
            (
                server.image_name().to_string(),
                server.name().to_string(),
                server.zombie(),
                server.pid(),
            )
        };

        // 1. Resolve the live target, adopting a pre-existing process if the
        //    supervisor did not spawn it
        let target = match own_pid {
            Some(pid) if self.host.is_running(pid).await.unwrap_or(false) => Some(pid),
            _ => self
                .host
                .find_by_image_name(&image_name)
                .await
                .unwrap_or_default()
                .first()
                .copied(),
        };

        let Some(pid) = target else {
            info!(server = %name, image = %image_name, "No matching process found, stop is a no-op");
            self.finish_stop(&name).await;
            return Ok(());
        };

        // 2. Best-effort save through the admin protocol
        if let Some(client) = rcon {
            match client.save().await {
                RconResponse::Reply(reply) => {
                    info!(server = %name, reply = %reply, "World save acknowledged, settling");
                    sleep(self.timing.save_settle).await;
                }
                RconResponse::NoResponse => {
                    warn!(server = %name, "Save command got no response, continuing shutdown");
                }
            }
        }

        // 3. Double tap: bounded graceful-termination attempts
        let mut exited = false;
        for attempt in 1..=self.timing.graceful_attempts {
            debug!(server = %name, pid = pid, attempt = attempt, "Sending graceful termination signal");
            if let Err(e) = self.host.signal_graceful(pid).await {
                debug!(
                    server = %name,
                    pid = pid,
                    error = %e,
                    "Graceful signal failed (process may have exited already)"
                );
            }
            if self.wait_for_exit(pid, self.timing.graceful_wait).await {
                exited = true;
                break;
            }
        }

        // 4. Zombie protection before the forceful step
        if !exited {
            if zombie.enabled() {
                info!(
                    server = %name,
                    pid = pid,
                    timeout_secs = zombie.timeout().as_secs(),
                    "Zombie protection: waiting for spontaneous exit"
                );
                exited = self.wait_for_exit(pid, zombie.timeout()).await;
            }
            if !exited {
                warn!(server = %name, pid = pid, "Force-killing unresponsive server process");
                if let Err(e) = self.host.force_kill(pid).await {
                    debug!(pid = pid, error = %e, "Force kill failed (process may have exited)");
                }
            }
        }

        // 5. Sweep any stragglers sharing the image name
        self.sweep_strays(&image_name).await;

        self.finish_stop(&name).await;
        Ok(())
    }

    async fn finish_stop(&self, name: &str) {
        let mut server = self.server.lock().await;
        if let Err(e) = server.mark_stopped() {
            error!(server = %name, error = %e, "Failed to record stopped state");
        }
        self.broadcast(server.state());
        info!(server = %name, "Server stopped");
    }

    /// Poll until the process is gone or the bound elapses
    async fn wait_for_exit(&self, pid: u32, bound: Duration) -> bool {
        let deadline = Instant::now() + bound;
        loop {
            match self.host.is_running(pid).await {
                Ok(false) => return true,
                Ok(true) => {}
                // Unobservable process: treat as gone
                Err(_) => return true,
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(self.timing.exit_poll).await;
        }
    }

    /// Best-effort cleanup of processes sharing the managed image name
    async fn sweep_strays(&self, image_name: &str) {
        match self.host.find_by_image_name(image_name).await {
            Ok(pids) => {
                for pid in pids {
                    warn!(pid = pid, image = %image_name, "Force-killing stray server process");
                    if let Err(e) = self.host.force_kill(pid).await {
                        debug!(pid = pid, error = %e, "Stray kill failed (may have exited already)");
                    }
                }
            }
            Err(e) => {
                debug!(image = %image_name, error = %e, "Stray sweep unavailable");
            }
        }
    }

    // ===== Supervision loop =====

    /// Receive exit events and handle crashes until cancelled
    pub async fn run(
        &self,
        mut exit_rx: mpsc::UnboundedReceiver<ServerExitEvent>,
        cancellation_token: CancellationToken,
    ) {
        info!("Server supervisor started (event-driven)");

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    info!("Server supervisor received shutdown signal");
                    break;
                }
                Some(event) = exit_rx.recv() => {
                    info!(
                        pid = event.pid,
                        exit_code = event.exit_code,
                        "Received process exit event"
                    );
                    self.handle_exit_event(event).await;
                }
            }
        }

        info!("Server supervisor stopped");
    }

    /// Handle an exit event; unexpected exits become crash handling
    async fn handle_exit_event(&self, event: ServerExitEvent) {
        let decision = {
            let mut server = self.server.lock().await;

            if server.pid() != Some(event.pid) {
                debug!(pid = event.pid, "Stale exit event for a superseded handle, ignoring");
                ExitDecision::Ignore
            } else if matches!(server.state(), ServerState::Stopping | ServerState::Stopped) {
                debug!(
                    pid = event.pid,
                    "Exit observed during explicit stop, shutdown sequence owns the transition"
                );
                ExitDecision::Ignore
            } else if !server.crash().detection_enabled() {
                let name = server.name().to_string();
                if let Err(e) = server.mark_stopped() {
                    error!(server = %name, error = %e, "Failed to fold exit into stopped state");
                }
                self.broadcast(server.state());
                ExitDecision::DetectionDisabled { name }
            } else {
                let name = server.name().to_string();
                let uptime = server.uptime();
                if let Err(e) = server.mark_crashed(Some(event.exit_code)) {
                    error!(server = %name, error = %e, "Failed to record crash");
                }
                self.broadcast(server.state());

                let attempt = if server.crash().can_attempt_restart() {
                    Some(server.crash_mut().record_attempt())
                } else {
                    None
                };
                ExitDecision::Crashed {
                    name,
                    uptime,
                    attempt,
                    max_attempts: server.crash().max_attempts(),
                }
            }
        };

        match decision {
            ExitDecision::Ignore => {}
            ExitDecision::DetectionDisabled { name } => {
                info!(
                    server = %name,
                    exit_code = event.exit_code,
                    "Unexpected exit with crash detection disabled, treating as stopped"
                );
            }
            ExitDecision::Crashed {
                name,
                uptime,
                attempt,
                max_attempts,
            } => {
                warn!(
                    server = %name,
                    exit_code = event.exit_code,
                    uptime_secs = uptime.map(|u| u.as_secs()),
                    "Server crashed"
                );

                // Out-of-band crash notification, never blocks the handler
                {
                    let notifier = self.notifier.clone();
                    let name = name.clone();
                    let exit_code = event.exit_code;
                    tokio::spawn(async move {
                        notifier
                            .send_crash_notification(
                                &name,
                                SystemTime::now(),
                                Some(exit_code),
                                uptime,
                            )
                            .await;
                    });
                }

                match attempt {
                    Some(attempt) => {
                        self.attempt_auto_restart(&name, attempt, max_attempts).await;
                    }
                    None => {
                        warn!(
                            server = %name,
                            attempts = max_attempts,
                            "Automatic restart unavailable (disabled or exhausted)"
                        );
                        self.notifier
                            .send_auto_restart_failure(&name, max_attempts)
                            .await;
                    }
                }
            }
        }
    }

    /// Crashed -> Starting -> Running with the last-used parameters
    /// Any failure falls back to Stopped plus a failure notification
    async fn attempt_auto_restart(&self, name: &str, attempt: u32, max_attempts: u32) {
        info!(
            server = %name,
            attempt = attempt,
            max_attempts = max_attempts,
            "Attempting automatic restart"
        );
        self.notifier
            .send_restart_notification(name, true, attempt, max_attempts)
            .await;

        match self.respawn_last(name).await {
            Ok(pid) => {
                info!(server = %name, pid = pid, attempt = attempt, "Server respawned after crash");
                let log_path = { self.server.lock().await.server_log().to_path_buf() };
                self.spawn_recovery_monitor(log_path, name, attempt);
            }
            Err(e) => {
                error!(server = %name, error = %e, "Automatic restart failed");
                {
                    let mut server = self.server.lock().await;
                    if let Err(te) = server.mark_stopped() {
                        error!(server = %name, error = %te, "Failed to record failed restart");
                    }
                    self.broadcast(server.state());
                }
                self.notifier
                    .send_auto_restart_failure(name, max_attempts)
                    .await;
            }
        }
    }

    async fn respawn_last(&self, name: &str) -> Result<u32> {
        let (executable, params) = {
            let server = self.server.lock().await;
            let params = server.last_params().cloned().ok_or_else(|| {
                DomainError::InvalidConfiguration(
                    "no retained launch parameters for restart".to_string(),
                )
            })?;
            (server.executable().to_path_buf(), params)
        };

        if !executable.exists() {
            return Err(DomainError::ExecutableMissing(
                executable.display().to_string(),
            ));
        }

        {
            let mut server = self.server.lock().await;
            server.mark_starting()?;
            self.broadcast(server.state());
        }

        sleep(self.timing.restart_cooldown).await;

        let (pid, exit_handle) = self.spawn_with_params(&executable, &params, name).await?;
        {
            let mut server = self.server.lock().await;
            server.mark_running(pid, params)?;
            self.broadcast(server.state());
        }
        if let Some(handle) = exit_handle {
            self.watcher.watch(pid, name, handle);
        }
        Ok(pid)
    }

    /// Hand off to the recovery monitor after an automatic restart
    ///
    /// The monitor resets the attempt counter only if no newer crash has
    /// superseded the restart it was confirming.
    fn spawn_recovery_monitor(&self, log_path: PathBuf, name: &str, attempt: u32) {
        let server = self.server.clone();
        let notifier = self.notifier.clone();
        let monitor = RecoveryMonitor::new(log_path, self.recovery.clone());
        let name = name.to_string();

        tokio::spawn(async move {
            match monitor.run().await {
                RecoveryOutcome::Ready => {
                    let superseded = {
                        let mut server = server.lock().await;
                        if server.crash().attempts() == attempt {
                            server.crash_mut().reset_attempts();
                            false
                        } else {
                            true
                        }
                    };
                    if superseded {
                        debug!(
                            server = %name,
                            attempt = attempt,
                            "Recovery confirmation superseded by a newer crash"
                        );
                    } else {
                        info!(
                            server = %name,
                            attempt = attempt,
                            "Recovery confirmed, attempt counter reset"
                        );
                        notifier.send_auto_restart_success(&name, attempt).await;
                    }
                }
                RecoveryOutcome::TimedOut => {
                    // Never kill on a possible false negative
                    warn!(
                        server = %name,
                        "Restarted server did not confirm readiness, leaving it running"
                    );
                }
            }
        });
    }
}
