pub mod notifier;
pub mod process_host;

pub use notifier::{Notifier, NullNotifier};
pub use process_host::{ProcessExitHandle, ProcessHost, SpawnConfig, SpawnResult};
