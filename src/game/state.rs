//! Game State Definitions
//!
//! The authoritative counters and entities shared by every peer.
//! Uses BTreeMap for deterministic iteration order.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Serialize, Deserialize};

use crate::core::hash::{StateHash, StateHasher};
use crate::core::transform::Vec3;
use crate::game::player::{CatapultId, PlayerId, Team};

/// Identifier of a dynamic entity. Allocated sequentially by the store.
pub type EntityId = u32;

/// Kind of dynamic entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntityKind {
    /// Slingshot ball.
    Projectile = 0,
}

/// A simulated object the host reports positions for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity kind.
    pub kind: EntityKind,
    /// Player who created it.
    pub owner: Option<PlayerId>,
    /// Last reported world position.
    pub position: Vec3,
    /// Launch velocity.
    pub velocity: Vec3,
}

/// Complete game state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Catapults still standing on team A.
    pub team_a_catapults: u32,
    /// Catapults still standing on team B.
    pub team_b_catapults: u32,
    /// Catapults per team at game start.
    pub catapults_per_team: u32,
    /// Destroyed catapults.
    pub knocked_out: BTreeSet<CatapultId>,
    /// Team each player joined by grabbing a catapult.
    pub teams: BTreeMap<PlayerId, Team>,
    /// Current catapult holder.
    pub grabbed: BTreeMap<CatapultId, PlayerId>,
    /// Live entities.
    pub entities: BTreeMap<EntityId, Entity>,
    /// Next entity id to allocate.
    pub next_entity_id: EntityId,
    /// Winning team, once decided.
    pub winner: Option<Team>,
    /// Number of actions applied so far.
    pub actions_applied: u64,
}

impl GameState {
    /// Fresh state with `catapults_per_team` catapults on each side.
    pub fn new(catapults_per_team: u32) -> Self {
        Self {
            team_a_catapults: catapults_per_team,
            team_b_catapults: catapults_per_team,
            catapults_per_team,
            knocked_out: BTreeSet::new(),
            teams: BTreeMap::new(),
            grabbed: BTreeMap::new(),
            entities: BTreeMap::new(),
            next_entity_id: 0,
            winner: None,
            actions_applied: 0,
        }
    }

    /// Remaining catapults for a team.
    pub fn catapults(&self, team: Team) -> u32 {
        match team {
            Team::A => self.team_a_catapults,
            Team::B => self.team_b_catapults,
        }
    }

    pub(crate) fn catapults_mut(&mut self, team: Team) -> &mut u32 {
        match team {
            Team::A => &mut self.team_a_catapults,
            Team::B => &mut self.team_b_catapults,
        }
    }

    /// Check the catapult exists on this board.
    pub fn has_catapult(&self, catapult: &CatapultId) -> bool {
        (catapult.index as u32) < self.catapults_per_team
    }

    /// Catapult currently held by `player`.
    pub fn held_by(&self, player: &PlayerId) -> Option<CatapultId> {
        self.grabbed
            .iter()
            .find(|(_, holder)| *holder == player)
            .map(|(catapult, _)| *catapult)
    }

    /// Team of a player, if they picked one.
    pub fn team_of(&self, player: &PlayerId) -> Option<Team> {
        self.teams.get(player).copied()
    }

    /// Check whether the game has been decided.
    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    /// Compute a deterministic hash of the full state.
    pub fn compute_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_game_state();
        hasher.update_u32(self.team_a_catapults);
        hasher.update_u32(self.team_b_catapults);
        hasher.update_u32(self.catapults_per_team);

        hasher.update_u32(self.knocked_out.len() as u32);
        for catapult in &self.knocked_out {
            hash_catapult(&mut hasher, catapult);
        }

        hasher.update_u32(self.teams.len() as u32);
        for (player, team) in &self.teams {
            hasher.update_uuid(&player.0);
            hasher.update_u8(*team as u8);
        }

        hasher.update_u32(self.grabbed.len() as u32);
        for (catapult, player) in &self.grabbed {
            hash_catapult(&mut hasher, catapult);
            hasher.update_uuid(&player.0);
        }

        hasher.update_u32(self.entities.len() as u32);
        for (id, entity) in &self.entities {
            hasher.update_u32(*id);
            hasher.update_u8(entity.kind as u8);
            hasher.update_bool(entity.owner.is_some());
            if let Some(owner) = &entity.owner {
                hasher.update_uuid(&owner.0);
            }
            hasher.update_vec3(entity.position);
            hasher.update_vec3(entity.velocity);
        }

        hasher.update_u32(self.next_entity_id);
        hasher.update_u8(self.winner.map(|t| t as u8 + 1).unwrap_or(0));
        hasher.update_u64(self.actions_applied);
        hasher.finalize()
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(crate::DEFAULT_CATAPULTS_PER_TEAM)
    }
}

fn hash_catapult(hasher: &mut StateHasher, catapult: &CatapultId) {
    hasher.update_u8(catapult.team as u8);
    hasher.update_u8(catapult.index);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state() {
        let state = GameState::new(3);
        assert_eq!(state.catapults(Team::A), 3);
        assert_eq!(state.catapults(Team::B), 3);
        assert!(!state.is_over());
        assert!(state.has_catapult(&CatapultId::new(Team::B, 2)));
        assert!(!state.has_catapult(&CatapultId::new(Team::B, 3)));
    }

    #[test]
    fn test_hash_tracks_changes() {
        let a = GameState::new(3);
        let mut b = GameState::new(3);
        assert_eq!(a.compute_hash(), b.compute_hash());

        b.team_b_catapults = 2;
        assert_ne!(a.compute_hash(), b.compute_hash());
    }

    #[test]
    fn test_held_by() {
        let mut state = GameState::new(3);
        let player = PlayerId::new([9; 16]);
        let catapult = CatapultId::new(Team::A, 1);
        state.grabbed.insert(catapult, player);

        assert_eq!(state.held_by(&player), Some(catapult));
        assert_eq!(state.held_by(&PlayerId::new([1; 16])), None);
    }
}
