//! Opcode catalogue for the Evrima admin protocol
//! Byte values are fixed by the game server and must not change.

use std::fmt;

/// Single byte identifying which admin command an exec frame carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Announce = 0x10,
    DirectMessage = 0x11,
    ServerDetails = 0x12,
    WipeCorpses = 0x13,
    UpdatePlayables = 0x15,
    Ban = 0x20,
    Kick = 0x30,
    /// Non-functional on the reference server; superseded by [`Opcode::PlayerData`]
    PlayerList = 0x40,
    Save = 0x50,
    PlayerData = 0x77,
    ToggleWhitelist = 0x81,
    AddWhitelistId = 0x82,
    RemoveWhitelistId = 0x83,
    ToggleGlobalChat = 0x84,
    ToggleHumans = 0x86,
    ToggleAi = 0x90,
    DisableAiClasses = 0x91,
    AiDensity = 0x92,
}

impl Opcode {
    pub fn byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::Announce => "announce",
            Opcode::DirectMessage => "direct-message",
            Opcode::ServerDetails => "server-details",
            Opcode::WipeCorpses => "wipe-corpses",
            Opcode::UpdatePlayables => "update-playables",
            Opcode::Ban => "ban",
            Opcode::Kick => "kick",
            Opcode::PlayerList => "player-list",
            Opcode::Save => "save",
            Opcode::PlayerData => "player-data",
            Opcode::ToggleWhitelist => "toggle-whitelist",
            Opcode::AddWhitelistId => "add-whitelist-id",
            Opcode::RemoveWhitelistId => "remove-whitelist-id",
            Opcode::ToggleGlobalChat => "toggle-global-chat",
            Opcode::ToggleHumans => "toggle-humans",
            Opcode::ToggleAi => "toggle-ai",
            Opcode::DisableAiClasses => "disable-ai-classes",
            Opcode::AiDensity => "ai-density",
        };
        write!(f, "{}", name)
    }
}
