//! Presentation Callbacks
//!
//! The coordinator reports what happened through a `SessionDelegate` passed
//! in at construction. Every method has a no-op default so observers only
//! implement what they display. An unbounded `SessionEvent` sender is itself
//! a delegate, for presentation layers that prefer a channel.

use tokio::sync::mpsc;

use crate::game::player::{Player, Team};
use crate::game::state::GameState;
use crate::network::peer::ConnectionError;
use crate::session::state_machine::SessionState;
use crate::world::board::BoardSetupAction;

/// Observer of coordinator events.
pub trait SessionDelegate: Send {
    /// A board setup message arrived from `from`.
    fn received_board_action(&mut self, _action: &BoardSetupAction, _from: &Player) {}

    /// Connected to the host.
    fn joining_host(&mut self, _host: &Player) {}

    /// A non-host player joined.
    fn joining_player(&mut self, _player: &Player) {}

    /// The host left. The session cannot continue.
    fn leaving_host(&mut self, _host: &Player) {}

    /// A non-host player left.
    fn leaving_player(&mut self, _player: &Player) {}

    /// The simulation started.
    fn did_start_game(&mut self) {}

    /// The local player's team won.
    fn did_win_game(&mut self, _team: Team) {}

    /// The advisory network delay flag changed.
    fn has_network_delay(&mut self, _delayed: bool) {}

    /// Game state changed this tick.
    fn updated(&mut self, _state: &GameState) {}

    /// Session moved between phases.
    fn session_state_changed(&mut self, _from: SessionState, _to: SessionState) {}

    /// One-line message for the user.
    fn alert(&mut self, _message: &str) {}

    /// A send to a peer failed.
    fn peer_unavailable(&mut self, _error: &ConnectionError) {}
}

/// Delegate that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelegate;

impl SessionDelegate for NoopDelegate {}

/// Owned form of every delegate callback.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ReceivedBoardAction { action: BoardSetupAction, from: Player },
    JoiningHost(Player),
    JoiningPlayer(Player),
    LeavingHost(Player),
    LeavingPlayer(Player),
    DidStartGame,
    DidWinGame(Team),
    HasNetworkDelay(bool),
    Updated(Box<GameState>),
    SessionStateChanged { from: SessionState, to: SessionState },
    Alert(String),
    PeerUnavailable(ConnectionError),
}

impl SessionDelegate for mpsc::UnboundedSender<SessionEvent> {
    fn received_board_action(&mut self, action: &BoardSetupAction, from: &Player) {
        let _ = self.send(SessionEvent::ReceivedBoardAction {
            action: action.clone(),
            from: from.clone(),
        });
    }

    fn joining_host(&mut self, host: &Player) {
        let _ = self.send(SessionEvent::JoiningHost(host.clone()));
    }

    fn joining_player(&mut self, player: &Player) {
        let _ = self.send(SessionEvent::JoiningPlayer(player.clone()));
    }

    fn leaving_host(&mut self, host: &Player) {
        let _ = self.send(SessionEvent::LeavingHost(host.clone()));
    }

    fn leaving_player(&mut self, player: &Player) {
        let _ = self.send(SessionEvent::LeavingPlayer(player.clone()));
    }

    fn did_start_game(&mut self) {
        let _ = self.send(SessionEvent::DidStartGame);
    }

    fn did_win_game(&mut self, team: Team) {
        let _ = self.send(SessionEvent::DidWinGame(team));
    }

    fn has_network_delay(&mut self, delayed: bool) {
        let _ = self.send(SessionEvent::HasNetworkDelay(delayed));
    }

    fn updated(&mut self, state: &GameState) {
        let _ = self.send(SessionEvent::Updated(Box::new(state.clone())));
    }

    fn session_state_changed(&mut self, from: SessionState, to: SessionState) {
        let _ = self.send(SessionEvent::SessionStateChanged { from, to });
    }

    fn alert(&mut self, message: &str) {
        let _ = self.send(SessionEvent::Alert(message.to_string()));
    }

    fn peer_unavailable(&mut self, error: &ConnectionError) {
        let _ = self.send(SessionEvent::PeerUnavailable(error.clone()));
    }
}
