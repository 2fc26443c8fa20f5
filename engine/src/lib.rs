//! esm_engine - supervision engine for The Isle: Evrima dedicated servers
//!
//! The engine owns one managed server process end to end: validated launch
//! with OS tuning, event-driven crash detection with bounded automatic
//! restarts, log-tail recovery confirmation, and an orderly multi-stage
//! shutdown that saves the world through RCON before anything forceful.

pub mod constants;
pub mod domain;
pub mod infrastructure;
pub mod rcon;

pub use domain::entities::{GameServer, ServerLayout};
pub use domain::ports::{Notifier, NullNotifier, ProcessHost, SpawnConfig, SpawnResult};
pub use domain::services::{
    RecoveryConfig, RecoveryMonitor, RecoveryOutcome, ServerExitEvent, ServerSupervisor,
    SupervisorTiming,
};
pub use domain::{
    AffinityMask, CrashContext, DomainError, LaunchParameters, PriorityClass, Result, ServerState,
    ZombiePolicy,
};
pub use infrastructure::{EngineConfig, TokioProcessHost};
pub use rcon::{extract_players, Opcode, PlayerRecord, RconClient, RconCommand, RconResponse};
