pub mod exit_watcher;
pub mod recovery_monitor;
pub mod supervisor;

pub use exit_watcher::{ExitWatcher, ServerExitEvent};
pub use recovery_monitor::{RecoveryConfig, RecoveryMonitor, RecoveryOutcome};
pub use supervisor::{ServerSupervisor, SupervisorTiming};
