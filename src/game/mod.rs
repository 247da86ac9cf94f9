//! Game Logic Module
//!
//! Game state and the actions that change it. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `player`: Player identity, teams, catapult ids
//! - `action`: State-changing actions
//! - `state`: Counters and entities shared by every peer
//! - `store`: The single mutator of game state, plus replay

pub mod action;
pub mod player;
pub mod state;
pub mod store;

// Re-export key types
pub use action::GameAction;
pub use player::{CatapultId, Player, PlayerId, Team};
pub use state::{Entity, EntityId, EntityKind, GameState};
pub use store::{GameStateStore, StateChange, StateDelta, WorldBounds};
