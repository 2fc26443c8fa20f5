//! Domain layer: entities, value objects, ports, and services
//! No OS or network specifics live here; those stay behind the ports.

pub mod entities;
pub mod error;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use entities::{GameServer, ServerLayout};
pub use error::{DomainError, Result};
pub use value_objects::{
    AffinityMask, CrashContext, LaunchParameters, PriorityClass, ServerState, ZombiePolicy,
};
