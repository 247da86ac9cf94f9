//! Game Advertisement
//!
//! `NetworkGame` is what a host publishes so nearby players can find and
//! join it. Records are compared by value and used as discovery-list keys.

use std::convert::Infallible;
use std::sync::Arc;
use serde::{Serialize, Deserialize};

use crate::core::cache::ResourceCache;
use crate::game::player::Player;

/// A physical table the game is played on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameTableLocation {
    /// Table index.
    pub id: u32,
    /// Display name.
    pub name: String,
}

impl GameTableLocation {
    fn with_id(id: u32) -> Self {
        Self {
            id,
            name: format!("Table {}", id + 1),
        }
    }
}

/// Table locations, created on first lookup and kept for the table's lifetime.
#[derive(Default)]
pub struct LocationTable {
    locations: ResourceCache<u32, GameTableLocation>,
}

impl LocationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Location for `id`. Repeated lookups return the same shared record.
    pub fn location(&self, id: u32) -> Arc<GameTableLocation> {
        match self
            .locations
            .get_or_load(&id, |id| Ok::<_, Infallible>(GameTableLocation::with_id(*id)))
        {
            Ok(location) => location,
            Err(never) => match never {},
        }
    }

    /// Number of locations looked up so far.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Check if no location has been looked up.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

/// Session advertisement record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkGame {
    /// Game name shown in discovery lists.
    pub name: String,
    /// Hosting player.
    pub host: Player,
    /// Index into the location table.
    pub location_id: u32,
}

impl NetworkGame {
    /// Create a record. Without a name the game is called "<host>'s Game".
    pub fn new(host: Player, name: Option<String>, location_id: u32) -> Self {
        let name = name.unwrap_or_else(|| format!("{}'s Game", host.username));
        Self {
            name,
            host,
            location_id,
        }
    }

    /// Resolve the table this game is played at.
    pub fn location(&self, table: &LocationTable) -> Arc<GameTableLocation> {
        table.location(self.location_id)
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_name() {
        let alice = Player::new("Alice");
        let game = NetworkGame::new(alice, None, 2);
        assert_eq!(game.name, "Alice's Game");
        assert_eq!(game.location_id, 2);
    }

    #[test]
    fn test_explicit_name_kept() {
        let game = NetworkGame::new(Player::new("Alice"), Some("Lunch match".into()), 0);
        assert_eq!(game.name, "Lunch match");
    }

    #[test]
    fn test_equality_and_hashing() {
        let alice = Player::new("Alice");
        let a = NetworkGame::new(alice.clone(), None, 2);
        let b = NetworkGame::new(alice.clone(), None, 2);
        let c = NetworkGame::new(alice, None, 3);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let games: HashSet<NetworkGame> = [a, b, c].into_iter().collect();
        assert_eq!(games.len(), 2);
    }

    #[test]
    fn test_location_lookup_is_cached() {
        let table = LocationTable::new();
        let game = NetworkGame::new(Player::new("Alice"), None, 2);

        let first = game.location(&table);
        let second = table.location(2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name, "Table 3");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_json_roundtrip() {
        let game = NetworkGame::new(Player::new("Bob"), None, 1);
        let json = game.to_json().unwrap();
        assert_eq!(NetworkGame::from_json(&json).unwrap(), game);
    }
}
