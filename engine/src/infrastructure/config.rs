//! Configuration loading from YAML files
//!
//! One YAML file describes one managed server: where it lives on disk, how
//! to reach its admin port, and the launch/crash/zombie policies. Sections
//! and fields are optional wherever a sensible default exists; validation of
//! port and affinity happens when the launch parameters are built, not at
//! parse time.

use crate::constants::{DEFAULT_IMAGE_NAME, DEFAULT_RCON_PORT, DEFAULT_READY_MARKER};
use crate::domain::services::RecoveryConfig;
use crate::domain::{
    CrashContext, DomainError, LaunchParameters, PriorityClass, Result, ServerLayout, ZombiePolicy,
};
use crate::rcon::RconClient;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration structure
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub server: ServerSection,

    #[serde(default)]
    pub rcon: RconSection,

    #[serde(default)]
    pub launch: LaunchSection,

    #[serde(default)]
    pub crash: CrashSection,

    #[serde(default)]
    pub zombie: ZombieSection,

    #[serde(default)]
    pub recovery: RecoverySection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ServerSection {
    /// Display name used in notifications and logs
    #[serde(default = "default_server_name")]
    pub name: String,

    /// Full path to the server executable
    pub executable: PathBuf,

    /// Process image name used for adoption and stray sweeps
    #[serde(default = "default_image_name")]
    pub image_name: String,

    /// Path of the server's own log file
    pub server_log: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RconSection {
    #[serde(default = "default_rcon_host")]
    pub host: String,

    #[serde(default = "default_rcon_port")]
    pub port: u16,

    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LaunchSection {
    #[serde(default = "default_game_port")]
    pub port: u32,

    #[serde(default)]
    pub extra_args: Option<String>,

    #[serde(default)]
    pub priority: PriorityClass,

    /// Comma list of core indices, empty means no explicit mask
    #[serde(default)]
    pub affinity: String,

    #[serde(default = "default_true")]
    pub use_all_cores: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CrashSection {
    #[serde(default = "default_true")]
    pub detection_enabled: bool,

    #[serde(default = "default_true")]
    pub auto_restart: bool,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ZombieSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_zombie_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecoverySection {
    #[serde(default = "default_ready_marker")]
    pub marker: String,

    #[serde(default = "default_recovery_window")]
    pub window_secs: u64,
}

fn default_server_name() -> String {
    "evrima".to_string()
}

fn default_image_name() -> String {
    DEFAULT_IMAGE_NAME.to_string()
}

fn default_rcon_host() -> String {
    "127.0.0.1".to_string()
}

fn default_rcon_port() -> u16 {
    DEFAULT_RCON_PORT
}

fn default_game_port() -> u32 {
    7777
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_zombie_timeout() -> u64 {
    120
}

fn default_ready_marker() -> String {
    DEFAULT_READY_MARKER.to_string()
}

fn default_recovery_window() -> u64 {
    300
}

impl Default for RconSection {
    fn default() -> Self {
        Self {
            host: default_rcon_host(),
            port: default_rcon_port(),
            password: String::new(),
        }
    }
}

impl Default for LaunchSection {
    fn default() -> Self {
        Self {
            port: default_game_port(),
            extra_args: None,
            priority: PriorityClass::default(),
            affinity: String::new(),
            use_all_cores: true,
        }
    }
}

impl Default for CrashSection {
    fn default() -> Self {
        Self {
            detection_enabled: true,
            auto_restart: true,
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for ZombieSection {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_zombie_timeout(),
        }
    }
}

impl Default for RecoverySection {
    fn default() -> Self {
        Self {
            marker: default_ready_marker(),
            window_secs: default_recovery_window(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DomainError::InvalidConfiguration(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        serde_yaml::from_str(&contents).map_err(|e| {
            DomainError::InvalidConfiguration(format!(
                "failed to parse YAML from '{}': {}",
                path.display(),
                e
            ))
        })
    }

    pub fn server_layout(&self) -> ServerLayout {
        ServerLayout {
            name: self.server.name.clone(),
            executable: self.server.executable.clone(),
            image_name: self.server.image_name.clone(),
            server_log: self.server.server_log.clone(),
        }
    }

    /// Build validated launch parameters; rejects bad port or affinity
    pub fn launch_parameters(&self) -> Result<LaunchParameters> {
        LaunchParameters::new(
            self.launch.port,
            self.launch.extra_args.clone(),
            self.launch.priority,
            &self.launch.affinity,
            self.launch.use_all_cores,
        )
    }

    pub fn crash_context(&self) -> CrashContext {
        CrashContext::new(
            self.crash.detection_enabled,
            self.crash.auto_restart,
            self.crash.max_attempts,
        )
    }

    pub fn zombie_policy(&self) -> ZombiePolicy {
        ZombiePolicy::new(self.zombie.enabled, self.zombie.timeout_secs)
    }

    pub fn recovery_config(&self) -> RecoveryConfig {
        RecoveryConfig {
            marker: self.recovery.marker.clone(),
            window: Duration::from_secs(self.recovery.window_secs),
            ..RecoveryConfig::default()
        }
    }

    pub fn rcon_client(&self) -> RconClient {
        RconClient::new(self.rcon.host.clone(), self.rcon.port, self.rcon.password.clone())
    }
}

/// Determine the configuration file path using precedence rules
///
/// Precedence (first match wins):
/// 1. ESM_CONFIG environment variable
/// 2. ./esm.yaml (if the file exists)
/// 3. None
pub fn get_default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("ESM_CONFIG") {
        return Some(PathBuf::from(path));
    }

    let local = PathBuf::from("esm.yaml");
    if local.is_file() {
        return Some(local);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("esm.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let (_dir, path) = write_config(
            r#"
server:
  executable: /srv/isle/TheIsleServer
  server_log: /srv/isle/TheIsle/Saved/Logs/TheIsle.log
"#,
        );
        let config = EngineConfig::load(&path).unwrap();

        assert_eq!(config.server.name, "evrima");
        assert_eq!(config.server.image_name, DEFAULT_IMAGE_NAME);
        assert_eq!(config.rcon.port, DEFAULT_RCON_PORT);
        assert_eq!(config.launch.port, 7777);
        assert!(config.launch.use_all_cores);
        assert!(config.crash.auto_restart);
        assert_eq!(config.crash.max_attempts, 3);
        assert!(config.zombie.enabled);
        assert_eq!(config.recovery.marker, DEFAULT_READY_MARKER);
    }

    #[test]
    fn test_full_config_round_trip_to_domain() {
        let (_dir, path) = write_config(
            r#"
server:
  name: spiro-main
  executable: /srv/isle/TheIsleServer
  image_name: TheIsleServer-Win64-Shipping
  server_log: /srv/isle/TheIsle.log
rcon:
  host: 10.0.0.5
  port: 8890
  password: hunter2
launch:
  port: 7780
  extra_args: "-nosteam"
  priority: high
  affinity: ""
  use_all_cores: true
crash:
  detection_enabled: true
  auto_restart: true
  max_attempts: 5
zombie:
  enabled: false
  timeout_secs: 60
recovery:
  marker: "Engine is initialized"
  window_secs: 120
"#,
        );
        let config = EngineConfig::load(&path).unwrap();

        let layout = config.server_layout();
        assert_eq!(layout.name, "spiro-main");
        assert_eq!(layout.image_name, "TheIsleServer-Win64-Shipping");

        let params = config.launch_parameters().unwrap();
        assert_eq!(params.port(), 7780);
        assert_eq!(params.priority(), PriorityClass::High);

        let crash = config.crash_context();
        assert_eq!(crash.max_attempts(), 5);

        let zombie = config.zombie_policy();
        assert!(!zombie.enabled());

        let recovery = config.recovery_config();
        assert_eq!(recovery.window, Duration::from_secs(120));
    }

    #[test]
    fn test_invalid_launch_port_rejected_at_build() {
        let (_dir, path) = write_config(
            r#"
server:
  executable: /srv/isle/TheIsleServer
  server_log: /srv/isle/TheIsle.log
launch:
  port: 80
"#,
        );
        let config = EngineConfig::load(&path).unwrap();
        let err = config.launch_parameters().unwrap_err();
        assert!(matches!(err, DomainError::InvalidPort(80)));
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = EngineConfig::load(Path::new("/nonexistent/esm.yaml")).unwrap_err();
        assert!(matches!(err, DomainError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        let (_dir, path) = write_config("server: [not a mapping");
        assert!(EngineConfig::load(&path).is_err());
    }

    #[test]
    #[serial_test::serial]
    fn test_env_var_wins_path_precedence() {
        std::env::set_var("ESM_CONFIG", "/etc/esm/custom.yaml");
        assert_eq!(
            get_default_config_path(),
            Some(PathBuf::from("/etc/esm/custom.yaml"))
        );
        std::env::remove_var("ESM_CONFIG");
    }
}
