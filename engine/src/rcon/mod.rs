//! Binary admin protocol (RCON) for the managed game server

pub mod client;
pub mod opcode;
pub mod players;

pub use client::{RconClient, RconCommand, RconResponse};
pub use opcode::Opcode;
pub use players::{extract_players, PlayerRecord};
