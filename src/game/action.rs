//! Game Actions
//!
//! Every change to `GameState` is expressed as a `GameAction`. The host is the
//! only peer that turns actions into authoritative state; clients may request
//! the subset that concerns their own player.

use serde::{Serialize, Deserialize};
use crate::core::transform::Vec3;
use crate::game::player::{CatapultId, PlayerId};
use crate::game::state::EntityId;

/// A state-changing action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameAction {
    /// Player took hold of a catapult (joins that catapult's team).
    GrabCatapult {
        player: PlayerId,
        catapult: CatapultId,
    },

    /// Player let go of a catapult without firing.
    ReleaseCatapult {
        player: PlayerId,
        catapult: CatapultId,
    },

    /// Player fired a projectile from the catapult they hold.
    LaunchProjectile {
        player: PlayerId,
        catapult: CatapultId,
        position: Vec3,
        velocity: Vec3,
    },

    /// Physics moved an entity (host simulation output).
    MoveEntity {
        entity: EntityId,
        position: Vec3,
    },

    /// Entity removed from the world.
    RemoveEntity {
        entity: EntityId,
    },

    /// A catapult was destroyed.
    KnockOutCatapult {
        catapult: CatapultId,
    },

    /// Clear all dynamic entities and catapult grabs.
    ResetWorld,
}

impl GameAction {
    /// Player this action is performed by, if any.
    pub fn actor(&self) -> Option<PlayerId> {
        match self {
            GameAction::GrabCatapult { player, .. }
            | GameAction::ReleaseCatapult { player, .. }
            | GameAction::LaunchProjectile { player, .. } => Some(*player),
            _ => None,
        }
    }

    /// Check if a client may ask the host to perform this action.
    ///
    /// Only player-driven actions qualify, and only for the requesting player.
    pub fn is_requestable_by(&self, requester: &PlayerId) -> bool {
        self.actor().as_ref() == Some(requester)
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            GameAction::GrabCatapult { .. } => "grab_catapult",
            GameAction::ReleaseCatapult { .. } => "release_catapult",
            GameAction::LaunchProjectile { .. } => "launch_projectile",
            GameAction::MoveEntity { .. } => "move_entity",
            GameAction::RemoveEntity { .. } => "remove_entity",
            GameAction::KnockOutCatapult { .. } => "knock_out_catapult",
            GameAction::ResetWorld => "reset_world",
        }
    }
}
