//! SwiftShot Sync Demo
//!
//! Runs a host and two clients in one process over loopback links:
//! board handoff, a short match, then a state hash comparison.

use std::ops::Range;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use swiftshot::{
    config::{BoardLocatingMode, SessionConfig},
    core::hash::short_hex,
    game::{CatapultId, GameAction, GameState, Player, Team},
    network::loopback,
    session::{FrameInput, Role, SessionCoordinator, SessionDelegate, SessionState, SurfaceHit, TrackingState},
    Transform, TICK_RATE, VERSION,
};

/// Logs the callbacks a UI would display.
struct LogDelegate {
    name: &'static str,
}

impl SessionDelegate for LogDelegate {
    fn joining_host(&mut self, host: &Player) {
        info!("[{}] joined {}", self.name, host);
    }

    fn joining_player(&mut self, player: &Player) {
        info!("[{}] {} joined", self.name, player);
    }

    fn leaving_player(&mut self, player: &Player) {
        info!("[{}] {} left", self.name, player);
    }

    fn did_start_game(&mut self) {
        info!("[{}] game started", self.name);
    }

    fn did_win_game(&mut self, team: Team) {
        info!("[{}] we won as team {:?}", self.name, team);
    }

    fn session_state_changed(&mut self, from: SessionState, to: SessionState) {
        let hint = to.localized_instruction().unwrap_or("");
        info!("[{}] {} -> {} {}", self.name, from, to, hint);
    }

    fn alert(&mut self, message: &str) {
        warn!("[{}] {}", self.name, message);
    }
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let config = SessionConfig::from_env();
    info!("SwiftShot Sync v{}", VERSION);
    info!(
        "Tick Rate: {} Hz (default {}), board locating: {:?}",
        config.tick_rate, TICK_RATE, config.board_locating_mode
    );

    demo_match(config)
}

fn surface(distance: f32) -> FrameInput {
    FrameInput {
        camera_transform: Transform::IDENTITY,
        tracking: TrackingState::Normal,
        surface_hit: Some(SurfaceHit {
            transform: Transform::from_translation([0.0, -0.6, -1.2]),
            distance,
        }),
    }
}

/// Place and commit the board from a surface hit.
fn place_board(session: &mut SessionCoordinator) -> Result<()> {
    session.update_frame(surface(1.2));
    session.scale_board(1.5)?;
    session.commit_board()?;
    session.update_frame(surface(1.2));
    Ok(())
}

/// Catapult indices of one team. Catapult ids carry a `u8` index.
fn catapult_indices(config: &SessionConfig) -> Result<Range<u8>> {
    let count = u8::try_from(config.catapults_per_team).with_context(|| {
        format!("{} catapults per team do not fit a catapult index", config.catapults_per_team)
    })?;
    Ok(0..count)
}

/// Run `rounds` ticks on every session, paced at the configured tick rate.
fn tick_all(sessions: &mut [&mut SessionCoordinator], interval: Duration, rounds: usize) {
    for _ in 0..rounds {
        for session in sessions.iter_mut() {
            session.tick();
        }
        std::thread::sleep(interval);
    }
}

fn demo_match(config: SessionConfig) -> Result<()> {
    info!("=== Setting Up ===");

    let interval = config.tick_interval();
    let catapults = catapult_indices(&config)?;

    let alice = Player::new("Alice");
    let bob = Player::new("Bob");
    let carol = Player::new("Carol");

    let mut host = SessionCoordinator::new(
        alice.clone(),
        Role::Host,
        config.clone(),
        Box::new(LogDelegate { name: "alice" }),
    );
    let client_role = Role::Client { host: alice.id };
    let mut bob_session = SessionCoordinator::new(
        bob.clone(),
        client_role,
        config.clone(),
        Box::new(LogDelegate { name: "bob" }),
    );
    let mut carol_session = SessionCoordinator::new(
        carol.clone(),
        client_role,
        config.clone(),
        Box::new(LogDelegate { name: "carol" }),
    );

    let game = host.advertise(None, 0)?;
    info!("Advertising {:?} at table {}", game.name, game.location_id);

    host.begin()?;
    place_board(&mut host)?;
    // Stand-in for the AR session's spatial map.
    host.update_world_map((0..32 * 1024u32).map(|i| (i % 251) as u8).collect());

    bob_session.begin()?;
    carol_session.begin()?;
    let _bob_link = loopback::connect(alice.clone(), &host.inbound_sender(), bob.clone(), &bob_session.inbound_sender());
    let carol_link = loopback::connect(alice.clone(), &host.inbound_sender(), carol.clone(), &carol_session.inbound_sender());

    tick_all(&mut [&mut bob_session, &mut carol_session, &mut host], interval, 3);

    for client in [&mut bob_session, &mut carol_session] {
        match client.session_state() {
            SessionState::LocalizingToBoard => {
                client.board_anchor_recognized()?;
                client.update_frame(surface(1.2));
            }
            SessionState::LookingForSurface => place_board(client)?,
            other => anyhow::bail!("{} stuck in {}", client.local_player().username, other),
        }
        ensure!(client.session_state() == SessionState::GameInProgress);
    }
    if config.board_locating_mode == BoardLocatingMode::WorldMap {
        ensure!(bob_session.board_anchor() == host.board_anchor(), "board anchors differ");
    }

    info!("=== Playing ===");

    bob_session.submit_action(GameAction::GrabCatapult { player: bob.id, catapult: CatapultId::new(Team::A, 0) })?;
    carol_session.submit_action(GameAction::GrabCatapult { player: carol.id, catapult: CatapultId::new(Team::B, 0) })?;
    tick_all(&mut [&mut bob_session, &mut carol_session, &mut host], interval, 2);

    bob_session.submit_action(GameAction::LaunchProjectile {
        player: bob.id,
        catapult: CatapultId::new(Team::A, 0),
        position: [0.0, 0.1, -0.5],
        velocity: [0.0, 1.0, 2.0],
    })?;
    tick_all(&mut [&mut bob_session, &mut carol_session, &mut host], interval, 2);

    // Host physics knocks out team B one catapult at a time.
    for index in catapults {
        host.submit_action(GameAction::KnockOutCatapult { catapult: CatapultId::new(Team::B, index) })?;
        tick_all(&mut [&mut host, &mut bob_session, &mut carol_session], interval, 1);
    }
    tick_all(&mut [&mut bob_session, &mut carol_session, &mut host], interval, 2);

    info!("=== Results ===");
    report("alice", host.game_state());
    report("bob", bob_session.game_state());
    report("carol", carol_session.game_state());

    let hash = host.game_state().compute_hash();
    ensure!(hash == bob_session.game_state().compute_hash(), "bob diverged from host");
    ensure!(hash == carol_session.game_state().compute_hash(), "carol diverged from host");
    info!("CONSISTENCY VERIFIED: all peers at {}", short_hex(&hash));

    let history = host.store().log_hash();
    ensure!(history == bob_session.store().log_hash(), "bob applied a different action history");
    ensure!(history == carol_session.store().log_hash(), "carol applied a different action history");
    info!("Action history verified: {} actions at {}", host.store().log().len(), short_hex(&history));

    carol_session.exit()?;
    carol_link.disconnect();
    tick_all(&mut [&mut host], interval, 1);
    info!("{} peer(s) still connected to the host", host.peer_count());
    Ok(())
}

fn report(name: &str, state: &GameState) {
    info!(
        "{}: A={} B={} winner={:?} actions={} hash={}",
        name,
        state.catapults(Team::A),
        state.catapults(Team::B),
        state.winner,
        state.actions_applied,
        short_hex(&state.compute_hash()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catapult_indices() {
        let config = SessionConfig { catapults_per_team: 3, ..Default::default() };
        assert_eq!(catapult_indices(&config).unwrap(), 0..3);

        let config = SessionConfig { catapults_per_team: 300, ..Default::default() };
        assert!(catapult_indices(&config).is_err());
    }
}
