//! Engine-wide defaults and protocol limits

/// Image name of the dedicated-server process, without extension
pub const DEFAULT_IMAGE_NAME: &str = "TheIsleServer-Win64-Shipping";

/// Line in the server's own log that marks a completed boot
pub const DEFAULT_READY_MARKER: &str = "Engine is initialized";

/// Lowest game port accepted by launch validation
pub const MIN_GAME_PORT: u32 = 1024;
/// Highest game port accepted by launch validation
pub const MAX_GAME_PORT: u32 = 65535;

/// Default RCON admin port of the managed server
pub const DEFAULT_RCON_PORT: u16 = 8888;
/// Per-operation RCON bound (connect, read and write each)
pub const RCON_TIMEOUT_MS: u64 = 5000;
/// An entire reply is expected in a single read of at most this many bytes
pub const RCON_MAX_REPLY_BYTES: usize = 8192;

/// Wait after a graceful-termination signal before the next escalation step
pub const GRACEFUL_WAIT_SECS: u64 = 5;
/// Number of graceful-termination attempts before escalating ("double tap")
pub const GRACEFUL_ATTEMPTS: u32 = 2;
/// Settle delay after an acknowledged RCON save
pub const SAVE_SETTLE_SECS: u64 = 3;
/// Cool-down before an automatic respawn
pub const RESTART_COOLDOWN_SECS: u64 = 10;

/// Restart attempt bounds (maxAttempts is clamped into this range)
pub const MIN_RESTART_ATTEMPTS: u32 = 1;
pub const MAX_RESTART_ATTEMPTS: u32 = 10;

/// Zombie-protection timeout bounds in seconds
pub const MIN_ZOMBIE_TIMEOUT_SECS: u64 = 30;
pub const MAX_ZOMBIE_TIMEOUT_SECS: u64 = 300;

/// Overall window for the post-restart readiness search
pub const RECOVERY_WINDOW_SECS: u64 = 300;
/// Backoff between log polls while no new line is available
pub const RECOVERY_POLL_MS: u64 = 500;
