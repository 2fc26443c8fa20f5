//! Player-list extraction from player-data replies
//!
//! The server returns free-form text; player records are recognised anywhere
//! in it by shape, not by position. Unmatched text is ignored and an empty
//! reply yields an empty list, never an error.

use once_cell::sync::Lazy;
use regex::Regex;

static PLAYER_RECORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Name:\s*(.+?)\s*,\s*PlayerID:\s*(\d+)").expect("player record pattern")
});

/// One connected player as reported by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub name: String,
    pub id: String,
}

/// Extract every `Name: <text>, PlayerID: <digits>` occurrence, trimmed
pub fn extract_players(reply: &str) -> Vec<PlayerRecord> {
    PLAYER_RECORD
        .captures_iter(reply)
        .map(|caps| PlayerRecord {
            name: caps[1].trim().to_string(),
            id: caps[2].trim().to_string(),
        })
        .collect()
}
