//! Authoritative Game State Store
//!
//! `GameStateStore::apply` is the only way game state changes. Given the same
//! starting state and the same action sequence, every peer ends up with an
//! identical `GameState`:
//! - BTreeMap/BTreeSet for iteration order
//! - Entity ids allocated from a counter inside the state
//! - No clocks, no randomness
//!
//! The coordinator calls `apply` from its logic tick only.

use serde::{Serialize, Deserialize};

use crate::core::hash::{StateHash, StateHasher};
use crate::core::transform::{within_bounds, Vec3};
use crate::game::action::GameAction;
use crate::game::player::{CatapultId, PlayerId, Team};
use crate::game::state::{Entity, EntityId, EntityKind, GameState};

/// Fall-out box; entities moved outside it are removed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Default for WorldBounds {
    fn default() -> Self {
        // -10 on y is one meter below the table surface.
        Self {
            min: [-80.0, -10.0, -80.0],
            max: [80.0, 1000.0, 80.0],
        }
    }
}

/// One observable change produced by an action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StateChange {
    /// Player joined a team by grabbing one of its catapults.
    TeamJoined { player: PlayerId, team: Team },
    /// Catapult now held by player.
    CatapultGrabbed { player: PlayerId, catapult: CatapultId },
    /// Catapult released.
    CatapultReleased { player: PlayerId, catapult: CatapultId },
    /// Entity created.
    EntitySpawned { entity: EntityId },
    /// Entity position updated.
    EntityMoved { entity: EntityId },
    /// Entity gone; `fell` when it left the world bounds.
    EntityRemoved { entity: EntityId, fell: bool },
    /// Catapult destroyed.
    CatapultKnockedOut { catapult: CatapultId, remaining: u32 },
    /// A team won.
    GameWon { team: Team },
    /// Entities and grabs cleared.
    WorldReset,
}

/// Result of applying one action.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateDelta {
    /// Position of the action in the log (1-based).
    pub index: u64,
    /// Changes in application order; empty when the action was a no-op.
    pub changes: Vec<StateChange>,
}

impl StateDelta {
    /// Check if the action changed nothing.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Team that won with this action, if any.
    pub fn winner(&self) -> Option<Team> {
        self.changes.iter().find_map(|c| match c {
            StateChange::GameWon { team } => Some(*team),
            _ => None,
        })
    }
}

/// Holds the canonical state and the log of applied actions.
#[derive(Clone, Debug)]
pub struct GameStateStore {
    state: GameState,
    bounds: WorldBounds,
    log: Vec<GameAction>,
}

impl GameStateStore {
    /// Create a store starting from `initial`.
    pub fn new(initial: GameState, bounds: WorldBounds) -> Self {
        Self {
            state: initial,
            bounds,
            log: Vec::new(),
        }
    }

    /// Read-only view of the current state.
    pub fn current_state(&self) -> &GameState {
        &self.state
    }

    /// Actions applied since the store was created or last restored.
    pub fn log(&self) -> &[GameAction] {
        &self.log
    }

    /// Replace the state wholesale (late-joiner sync). Clears the log.
    pub fn restore(&mut self, state: GameState) {
        self.state = state;
        self.log.clear();
    }

    /// Hash of the action log, for comparing histories across peers.
    pub fn log_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_action_log();
        hasher.update_u64(self.log.len() as u64);
        for action in &self.log {
            // Encoding a GameAction into memory cannot fail.
            if let Ok(bytes) = bincode::serialize(action) {
                hasher.update_bytes(&bytes);
            }
        }
        hasher.finalize()
    }

    /// Apply one action. The only mutator of game state.
    pub fn apply(&mut self, action: &GameAction) -> StateDelta {
        let changes = match action {
            GameAction::GrabCatapult { player, catapult } => self.grab(*player, *catapult),
            GameAction::ReleaseCatapult { player, catapult } => self.release(*player, *catapult),
            GameAction::LaunchProjectile { player, catapult, position, velocity } => {
                self.launch(*player, *catapult, *position, *velocity)
            }
            GameAction::MoveEntity { entity, position } => self.move_entity(*entity, *position),
            GameAction::RemoveEntity { entity } => self.remove_entity(*entity),
            GameAction::KnockOutCatapult { catapult } => self.knock_out(*catapult),
            GameAction::ResetWorld => self.reset_world(),
        };

        self.state.actions_applied += 1;
        self.log.push(action.clone());

        StateDelta {
            index: self.state.actions_applied,
            changes,
        }
    }

    fn grab(&mut self, player: PlayerId, catapult: CatapultId) -> Vec<StateChange> {
        let state = &mut self.state;
        if state.is_over()
            || !state.has_catapult(&catapult)
            || state.knocked_out.contains(&catapult)
            || state.grabbed.contains_key(&catapult)
            || state.held_by(&player).is_some()
        {
            return Vec::new();
        }

        let mut changes = Vec::new();
        if state.teams.insert(player, catapult.team) != Some(catapult.team) {
            changes.push(StateChange::TeamJoined { player, team: catapult.team });
        }
        state.grabbed.insert(catapult, player);
        changes.push(StateChange::CatapultGrabbed { player, catapult });
        changes
    }

    fn release(&mut self, player: PlayerId, catapult: CatapultId) -> Vec<StateChange> {
        if self.state.grabbed.get(&catapult) != Some(&player) {
            return Vec::new();
        }
        self.state.grabbed.remove(&catapult);
        vec![StateChange::CatapultReleased { player, catapult }]
    }

    fn launch(
        &mut self,
        player: PlayerId,
        catapult: CatapultId,
        position: Vec3,
        velocity: Vec3,
    ) -> Vec<StateChange> {
        let state = &mut self.state;
        if state.is_over() || state.grabbed.get(&catapult) != Some(&player) {
            return Vec::new();
        }

        let entity = state.next_entity_id;
        state.next_entity_id = state.next_entity_id.wrapping_add(1);
        state.entities.insert(entity, Entity {
            kind: EntityKind::Projectile,
            owner: Some(player),
            position,
            velocity,
        });
        vec![StateChange::EntitySpawned { entity }]
    }

    fn move_entity(&mut self, entity: EntityId, position: Vec3) -> Vec<StateChange> {
        if !within_bounds(position, self.bounds.min, self.bounds.max) {
            return match self.state.entities.remove(&entity) {
                Some(_) => vec![StateChange::EntityRemoved { entity, fell: true }],
                None => Vec::new(),
            };
        }

        match self.state.entities.get_mut(&entity) {
            Some(e) => {
                e.position = position;
                vec![StateChange::EntityMoved { entity }]
            }
            None => Vec::new(),
        }
    }

    fn remove_entity(&mut self, entity: EntityId) -> Vec<StateChange> {
        match self.state.entities.remove(&entity) {
            Some(_) => vec![StateChange::EntityRemoved { entity, fell: false }],
            None => Vec::new(),
        }
    }

    fn knock_out(&mut self, catapult: CatapultId) -> Vec<StateChange> {
        let state = &mut self.state;
        if state.is_over()
            || !state.has_catapult(&catapult)
            || !state.knocked_out.insert(catapult)
        {
            return Vec::new();
        }

        let mut changes = Vec::new();
        if let Some(player) = state.grabbed.remove(&catapult) {
            changes.push(StateChange::CatapultReleased { player, catapult });
        }

        let remaining = {
            let count = state.catapults_mut(catapult.team);
            *count = count.saturating_sub(1);
            *count
        };
        changes.push(StateChange::CatapultKnockedOut { catapult, remaining });

        if remaining == 0 {
            let team = catapult.team.opponent();
            state.winner = Some(team);
            changes.push(StateChange::GameWon { team });
        }
        changes
    }

    fn reset_world(&mut self) -> Vec<StateChange> {
        self.state.entities.clear();
        self.state.grabbed.clear();
        vec![StateChange::WorldReset]
    }
}

/// Replay `actions` on a fresh store seeded with `initial`.
pub fn replay(initial: GameState, bounds: WorldBounds, actions: &[GameAction]) -> GameState {
    let mut store = GameStateStore::new(initial, bounds);
    for action in actions {
        store.apply(action);
    }
    store.state
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn alice() -> PlayerId {
        PlayerId::new([1; 16])
    }

    fn bob() -> PlayerId {
        PlayerId::new([2; 16])
    }

    fn store() -> GameStateStore {
        GameStateStore::new(GameState::new(3), WorldBounds::default())
    }

    #[test]
    fn test_grab_assigns_team() {
        let mut store = store();
        let catapult = CatapultId::new(Team::B, 0);

        let delta = store.apply(&GameAction::GrabCatapult { player: alice(), catapult });
        assert_eq!(delta.index, 1);
        assert_eq!(delta.changes[0], StateChange::TeamJoined { player: alice(), team: Team::B });
        assert_eq!(store.current_state().team_of(&alice()), Some(Team::B));

        // Already held: no-op, but still logged.
        let delta = store.apply(&GameAction::GrabCatapult { player: bob(), catapult });
        assert!(delta.is_empty());
        assert_eq!(store.log().len(), 2);
    }

    #[test]
    fn test_log_hash_follows_history() {
        let grab_a = GameAction::GrabCatapult { player: alice(), catapult: CatapultId::new(Team::A, 0) };
        let grab_b = GameAction::GrabCatapult { player: bob(), catapult: CatapultId::new(Team::B, 0) };

        let mut first = store();
        let mut second = store();
        assert_eq!(first.log_hash(), second.log_hash());

        first.apply(&grab_a);
        first.apply(&grab_b);
        second.apply(&grab_b);
        second.apply(&grab_a);
        assert_eq!(first.current_state().compute_hash(), second.current_state().compute_hash());
        assert_ne!(first.log_hash(), second.log_hash(), "same state, different order");

        let synced = first.current_state().clone();
        second.restore(synced);
        assert_eq!(second.log_hash(), store().log_hash());
    }

    #[test]
    fn test_launch_requires_holding() {
        let mut store = store();
        let catapult = CatapultId::new(Team::A, 1);
        let launch = GameAction::LaunchProjectile {
            player: alice(),
            catapult,
            position: [0.0, 1.0, 0.0],
            velocity: [0.0, 3.0, 1.0],
        };

        assert!(store.apply(&launch).is_empty());

        store.apply(&GameAction::GrabCatapult { player: alice(), catapult });
        let delta = store.apply(&launch);
        assert_eq!(delta.changes, vec![StateChange::EntitySpawned { entity: 0 }]);
        assert_eq!(store.current_state().entities.len(), 1);
    }

    #[test]
    fn test_entity_falls_out_of_bounds() {
        let mut store = store();
        let catapult = CatapultId::new(Team::A, 0);
        store.apply(&GameAction::GrabCatapult { player: alice(), catapult });
        store.apply(&GameAction::LaunchProjectile {
            player: alice(),
            catapult,
            position: [0.0; 3],
            velocity: [0.0; 3],
        });

        let moved = store.apply(&GameAction::MoveEntity { entity: 0, position: [1.0, 0.5, 1.0] });
        assert_eq!(moved.changes, vec![StateChange::EntityMoved { entity: 0 }]);

        let fell = store.apply(&GameAction::MoveEntity { entity: 0, position: [1.0, -11.0, 1.0] });
        assert_eq!(fell.changes, vec![StateChange::EntityRemoved { entity: 0, fell: true }]);
        assert!(store.current_state().entities.is_empty());
    }

    #[test]
    fn test_last_catapult_decides_winner() {
        let mut store = store();
        for index in 0..3 {
            let delta = store.apply(&GameAction::KnockOutCatapult {
                catapult: CatapultId::new(Team::A, index),
            });
            if index < 2 {
                assert_eq!(delta.winner(), None);
            } else {
                assert_eq!(delta.winner(), Some(Team::B));
            }
        }

        let state = store.current_state();
        assert_eq!(state.team_a_catapults, 0);
        assert_eq!(state.team_b_catapults, 3);
        assert_eq!(state.winner, Some(Team::B));

        // Decided games ignore further knockouts.
        let delta = store.apply(&GameAction::KnockOutCatapult {
            catapult: CatapultId::new(Team::B, 0),
        });
        assert!(delta.is_empty());
    }

    #[test]
    fn test_double_knockout_ignored() {
        let mut store = store();
        let catapult = CatapultId::new(Team::B, 2);
        store.apply(&GameAction::GrabCatapult { player: bob(), catapult });

        let first = store.apply(&GameAction::KnockOutCatapult { catapult });
        assert_eq!(first.changes.len(), 2, "release + knockout");
        assert!(store.apply(&GameAction::KnockOutCatapult { catapult }).is_empty());
        assert_eq!(store.current_state().team_b_catapults, 2);
    }

    #[test]
    fn test_reset_keeps_counters() {
        let mut store = store();
        store.apply(&GameAction::KnockOutCatapult { catapult: CatapultId::new(Team::A, 0) });
        store.apply(&GameAction::GrabCatapult { player: alice(), catapult: CatapultId::new(Team::A, 1) });

        store.apply(&GameAction::ResetWorld);
        let state = store.current_state();
        assert!(state.grabbed.is_empty());
        assert_eq!(state.team_a_catapults, 2);
    }

    #[test]
    fn test_restore_clears_log() {
        let mut source = store();
        source.apply(&GameAction::KnockOutCatapult { catapult: CatapultId::new(Team::A, 0) });

        let mut joiner = store();
        joiner.restore(source.current_state().clone());
        assert!(joiner.log().is_empty());
        assert_eq!(joiner.current_state().compute_hash(), source.current_state().compute_hash());
    }

    fn arb_catapult() -> impl Strategy<Value = CatapultId> {
        (prop_oneof![Just(Team::A), Just(Team::B)], 0u8..4)
            .prop_map(|(team, index)| CatapultId::new(team, index))
    }

    fn arb_player() -> impl Strategy<Value = PlayerId> {
        (1u8..4).prop_map(|b| PlayerId::new([b; 16]))
    }

    fn arb_vec3() -> impl Strategy<Value = Vec3> {
        prop::array::uniform3(-100.0f32..100.0)
    }

    fn arb_action() -> impl Strategy<Value = GameAction> {
        prop_oneof![
            (arb_player(), arb_catapult())
                .prop_map(|(player, catapult)| GameAction::GrabCatapult { player, catapult }),
            (arb_player(), arb_catapult())
                .prop_map(|(player, catapult)| GameAction::ReleaseCatapult { player, catapult }),
            (arb_player(), arb_catapult(), arb_vec3(), arb_vec3()).prop_map(
                |(player, catapult, position, velocity)| GameAction::LaunchProjectile {
                    player,
                    catapult,
                    position,
                    velocity,
                }
            ),
            (0u32..8, arb_vec3()).prop_map(|(entity, position)| GameAction::MoveEntity { entity, position }),
            (0u32..8).prop_map(|entity| GameAction::RemoveEntity { entity }),
            arb_catapult().prop_map(|catapult| GameAction::KnockOutCatapult { catapult }),
            Just(GameAction::ResetWorld),
        ]
    }

    proptest! {
        #[test]
        fn prop_replay_is_deterministic(actions in prop::collection::vec(arb_action(), 0..64)) {
            let mut live = store();
            for action in &actions {
                live.apply(action);
            }

            let replayed = replay(GameState::new(3), WorldBounds::default(), live.log());
            prop_assert_eq!(&replayed, live.current_state());
            prop_assert_eq!(replayed.compute_hash(), live.current_state().compute_hash());
        }

        #[test]
        fn prop_catapult_counts_never_underflow(actions in prop::collection::vec(arb_action(), 0..64)) {
            let mut live = store();
            for action in &actions {
                live.apply(action);
            }
            let state = live.current_state();
            prop_assert!(state.team_a_catapults <= 3);
            prop_assert!(state.team_b_catapults <= 3);
            prop_assert_eq!(
                (6 - state.team_a_catapults - state.team_b_catapults) as usize,
                state.knocked_out.len()
            );
        }
    }
}
