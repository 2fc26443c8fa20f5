pub mod affinity;
pub mod crash_policy;
pub mod launch_parameters;
pub mod priority_class;
pub mod server_state;
pub mod zombie_policy;

pub use affinity::AffinityMask;
pub use crash_policy::CrashContext;
pub use launch_parameters::LaunchParameters;
pub use priority_class::PriorityClass;
pub use server_state::ServerState;
pub use zombie_policy::ZombiePolicy;
