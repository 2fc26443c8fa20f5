//! Infrastructure layer: real adapters behind the domain ports

pub mod config;
pub mod tokio_host;

pub use config::{get_default_config_path, EngineConfig};
pub use tokio_host::TokioProcessHost;
