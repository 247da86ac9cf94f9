//! Player Identity
//!
//! Players, teams, and catapult identifiers.

use std::fmt;
use serde::{Serialize, Deserialize};

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (UUID as bytes).
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random identifier.
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..4]))
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// A participant in a session. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    /// Unique identifier.
    pub id: PlayerId,
    /// Display name.
    pub username: String,
}

impl Player {
    /// Create a player with a fresh identifier.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: PlayerId::random(),
            username: username.into(),
        }
    }

    /// Create a player with a known identifier.
    pub fn with_id(id: PlayerId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.username, self.id)
    }
}

// =============================================================================
// TEAMS
// =============================================================================

/// The two sides of the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Team {
    /// Team A (blue).
    A = 0,
    /// Team B (yellow).
    B = 1,
}

impl Team {
    /// The opposing team.
    pub fn opponent(self) -> Team {
        match self {
            Team::A => Team::B,
            Team::B => Team::A,
        }
    }
}

/// Identifies one catapult on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CatapultId {
    /// Owning team.
    pub team: Team,
    /// Index within the team (0-based).
    pub index: u8,
}

impl CatapultId {
    /// Create a catapult id.
    pub const fn new(team: Team, index: u8) -> Self {
        Self { team, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_roundtrip() {
        let id = PlayerId::random();
        let parsed = PlayerId::from_uuid_str(&id.to_uuid_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_player_identity() {
        let id = PlayerId::new([1; 16]);
        let a = Player::with_id(id, "Alice");
        assert_eq!(a, Player::with_id(id, "Alice"));
        assert_ne!(a, Player::with_id(id, "Alicia"));
        assert_eq!(a.id.to_string(), "01010101");
    }

    #[test]
    fn test_team_opponent() {
        assert_eq!(Team::A.opponent(), Team::B);
        assert_eq!(Team::B.opponent().opponent(), Team::B);
    }
}
