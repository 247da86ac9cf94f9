//! Session Coordinator
//!
//! Owns the game state store, the peer set and the session state machine,
//! and drives them from two entry points called by the frame loop:
//!
//! - `update_frame`: camera snapshot, board placement, level setup
//! - `tick` / `tick_at`: drain inbound events, apply queued actions,
//!   broadcast authoritative ones, report changes
//!
//! Network receive paths only enqueue; every mutation of game state and
//! session state happens inside these calls.
//!
//! ## Authority
//!
//! The host (or a solo player) is the only peer that sequences actions.
//! Clients send `ActionRequest`s and apply the host's `Action`s in order.
//! When the host leaves, the session is over for its clients: no further
//! actions are applied and nothing is promoted to host.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::{BoardLocatingMode, SessionConfig};
use crate::core::hash::short_hex;
use crate::core::transform::Transform;
use crate::game::action::GameAction;
use crate::game::player::{Player, PlayerId};
use crate::game::state::GameState;
use crate::game::store::GameStateStore;
use crate::network::broadcaster::{ActionBroadcaster, BroadcastError};
use crate::network::game::NetworkGame;
use crate::network::peer::{inbound_channel, InboundEvent, InboundQueue, InboundSender, PeerSession};
use crate::network::protocol::{ActionEnvelope, PeerMessage};
use crate::session::delegate::SessionDelegate;
use crate::session::state_machine::{transition, Effect, SessionState, Trigger, TransitionError};
use crate::world::board::{BoardAnchor, BoardSetupAction, GameBoardLocation};
use crate::world::snapshot::{WorldSnapshot, WorldSnapshotCodec};

/// Notification text shown when the host leaves.
pub const HOST_LEFT_MESSAGE: &str =
    "The host left the game. Please join another game or start your own!";

// =============================================================================
// TYPES
// =============================================================================

/// Local role in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Single player, no peers.
    Solo,
    /// Hosting a networked game.
    Host,
    /// Joined the game hosted by `host`.
    Client { host: PlayerId },
}

impl Role {
    /// Check if this peer sequences actions.
    pub fn is_authority(&self) -> bool {
        !matches!(self, Role::Client { .. })
    }
}

/// AR camera tracking quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    /// Tracking is good.
    #[default]
    Normal,
    /// Tracking works with reduced quality.
    Limited,
    /// No tracking.
    NotAvailable,
}

/// Result of the AR hit test at the screen center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    /// Pose of the hit on the plane.
    pub transform: Transform,
    /// Distance from the camera in meters.
    pub distance: f32,
}

/// Per-frame input from the AR collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    /// Camera pose.
    pub camera_transform: Transform,
    /// Camera tracking quality.
    pub tracking: TrackingState,
    /// Hit test result, if any.
    pub surface_hit: Option<SurfaceHit>,
}

/// Per-frame output for the rendering collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameOutput {
    /// Board to draw, if placed.
    pub board_anchor: Option<BoardAnchor>,
    /// Show the placement border.
    pub border_visible: bool,
}

/// Camera state copied once per frame for read-only consumers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraSnapshot {
    /// Frame counter, starting at 1.
    pub frame: u64,
    /// Camera pose.
    pub transform: Transform,
    /// Tracking quality.
    pub tracking: TrackingState,
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Inbound events handled.
    pub events: usize,
    /// Actions applied to the store.
    pub applied: usize,
    /// Actions broadcast to peers.
    pub broadcast: usize,
    /// Game state changed.
    pub state_changed: bool,
    /// New value of the network delay flag, if it flipped.
    pub delay_changed: Option<bool>,
}

/// Coordinator errors returned to the caller.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The host left; the session cannot continue.
    #[error("the host left the game")]
    HostUnavailable,

    /// Gameplay before the game started.
    #[error("game is not in progress (state: {0})")]
    GameNotInProgress(SessionState),

    /// Clients may only request their own player actions.
    #[error("{0} cannot be requested by this player")]
    NotPermitted(&'static str),

    /// Board gestures outside placement.
    #[error("board cannot be adjusted in state {0}")]
    BoardLocked(SessionState),

    /// Scale factor is not a positive finite number.
    #[error("invalid board scale factor {0}")]
    InvalidScale(f32),

    /// Board pose has a NaN or infinite component.
    #[error("board transform is not finite")]
    InvalidTransform,

    /// Only the host (or a solo player) advertises a game.
    #[error("only the host can advertise a game")]
    NotHost,

    /// Trigger not valid in the current state.
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

// =============================================================================
// COORDINATOR
// =============================================================================

/// Drives one participant's view of a session.
pub struct SessionCoordinator {
    /// Local player.
    local: Player,
    /// Local role.
    role: Role,
    /// Configuration.
    config: SessionConfig,
    /// Presentation callbacks.
    delegate: Box<dyn SessionDelegate>,

    /// Current lifecycle phase.
    state: SessionState,
    /// Authoritative (host) or replicated (client) game state.
    store: GameStateStore,
    /// Peer fan-out.
    broadcaster: ActionBroadcaster,
    /// Known peers.
    players: BTreeMap<PlayerId, Player>,
    /// Host disconnected; terminal for clients.
    host_left: bool,

    /// Producer handle given to transports.
    inbound_tx: InboundSender,
    /// Events waiting for the next tick.
    inbound: InboundQueue,
    /// Actions waiting to be applied, in receipt order.
    queued_actions: VecDeque<ActionEnvelope>,
    /// Highest sequence number applied (host: issued).
    last_seq: u64,

    /// Board pose without scale.
    board_pose: Transform,
    /// Board uniform scale.
    board_scale: f32,
    /// Board has been placed on a surface.
    board_placed: bool,
    /// Placement border visible.
    border_visible: bool,
    /// Finalized (host) or received (client) anchor.
    board_anchor: Option<BoardAnchor>,
    /// Client asked the host for the board.
    board_request_sent: bool,

    /// Latest spatial map from the AR collaborator (host).
    world_map: Option<Vec<u8>>,
    /// Bumped whenever the map or anchor changes.
    map_generation: u64,
    /// Encoded snapshot for `map_generation`.
    encoded_map: Option<Vec<u8>>,
    /// An encode job for `map_generation` is running.
    encoding_in_flight: bool,
    /// Peers waiting for the world map.
    deferred_board_requests: BTreeSet<PlayerId>,
    /// Snapshot received from the host (client).
    received_snapshot: Option<WorldSnapshot>,

    /// Camera snapshot channel.
    camera_tx: watch::Sender<CameraSnapshot>,
    /// Frames seen.
    frame: u64,
    /// Current advertisement (host).
    advertisement: Option<NetworkGame>,
}

impl SessionCoordinator {
    /// Create a coordinator in `setup`.
    pub fn new(local: Player, role: Role, config: SessionConfig, delegate: Box<dyn SessionDelegate>) -> Self {
        let (inbound_tx, inbound) = inbound_channel();
        let (camera_tx, _) = watch::channel(CameraSnapshot::default());
        let store = GameStateStore::new(
            GameState::new(config.catapults_per_team),
            config.entity_bounds(),
        );
        let broadcaster = ActionBroadcaster::new(
            config.network_delay_threshold(),
            config.max_pending_acks,
        );
        let board_scale = config.default_board_scale;

        Self {
            local,
            role,
            config,
            delegate,
            state: SessionState::Setup,
            store,
            broadcaster,
            players: BTreeMap::new(),
            host_left: false,
            inbound_tx,
            inbound,
            queued_actions: VecDeque::new(),
            last_seq: 0,
            board_pose: Transform::IDENTITY,
            board_scale,
            board_placed: false,
            border_visible: false,
            board_anchor: None,
            board_request_sent: false,
            world_map: None,
            map_generation: 0,
            encoded_map: None,
            encoding_in_flight: false,
            deferred_board_requests: BTreeSet::new(),
            received_snapshot: None,
            camera_tx,
            frame: 0,
            advertisement: None,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Local player.
    pub fn local_player(&self) -> &Player {
        &self.local
    }

    /// Local role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current lifecycle phase.
    pub fn session_state(&self) -> SessionState {
        self.state
    }

    /// Read-only view of the game state.
    pub fn game_state(&self) -> &GameState {
        self.store.current_state()
    }

    /// The store, for log inspection.
    pub fn store(&self) -> &GameStateStore {
        &self.store
    }

    /// Finalized or received board anchor.
    pub fn board_anchor(&self) -> Option<BoardAnchor> {
        self.board_anchor
    }

    /// Snapshot received from the host, if any.
    pub fn received_snapshot(&self) -> Option<&WorldSnapshot> {
        self.received_snapshot.as_ref()
    }

    /// Highest applied (client) or issued (host) sequence number.
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    /// Actions waiting for a tick in `gameInProgress`.
    pub fn queued_actions(&self) -> usize {
        self.queued_actions.len()
    }

    /// Peers in the broadcast set.
    pub fn peer_count(&self) -> usize {
        self.broadcaster.len()
    }

    /// Check if the host is still reachable (always true for authorities).
    pub fn is_host_available(&self) -> bool {
        !self.host_left
    }

    /// Current advisory delay flag.
    pub fn has_network_delay(&self) -> bool {
        self.broadcaster.is_delayed()
    }

    /// Handle for transports to deliver events.
    pub fn inbound_sender(&self) -> InboundSender {
        self.inbound_tx.clone()
    }

    /// Camera snapshots, updated once per frame.
    pub fn camera_feed(&self) -> watch::Receiver<CameraSnapshot> {
        self.camera_tx.subscribe()
    }

    /// Current advertisement.
    pub fn advertisement(&self) -> Option<&NetworkGame> {
        self.advertisement.as_ref()
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Leave `setup`: host/solo start looking for a surface, clients wait
    /// for the board.
    pub fn begin(&mut self) -> Result<SessionState, SessionError> {
        let trigger = match self.role {
            Role::Solo | Role::Host => Trigger::HostGame,
            Role::Client { .. } => Trigger::JoinGame,
        };
        Ok(self.fire(trigger, Instant::now())?)
    }

    /// Leave the game and return to `setup`.
    ///
    /// Connected peers get a `Leave` message and are dropped; the next game
    /// starts with fresh connections and sequence numbers.
    pub fn exit(&mut self) -> Result<SessionState, SessionError> {
        if self.role == Role::Host && !self.broadcaster.is_empty() {
            info!(peers = self.broadcaster.len(), "host leaving, peers will lose the game");
        }
        Ok(self.fire(Trigger::Exit, Instant::now())?)
    }

    /// Advertise the hosted game.
    pub fn advertise(&mut self, name: Option<String>, location_id: u32) -> Result<NetworkGame, SessionError> {
        if !self.role.is_authority() {
            return Err(SessionError::NotHost);
        }
        let game = NetworkGame::new(self.local.clone(), name, location_id);
        info!(name = %game.name, location_id, "advertising game");
        self.advertisement = Some(game.clone());
        Ok(game)
    }

    /// Move the advertised game to another table.
    pub fn update_session_location(&mut self, location_id: u32) -> Option<&NetworkGame> {
        let game = self.advertisement.as_mut()?;
        if game.location_id != location_id {
            debug!(from = game.location_id, to = location_id, "session location updated");
            game.location_id = location_id;
        }
        Some(game)
    }

    // -------------------------------------------------------------------------
    // Board
    // -------------------------------------------------------------------------

    /// Stop following the surface and let the user adjust.
    pub fn adjust_board(&mut self) -> Result<SessionState, SessionError> {
        Ok(self.fire(Trigger::AdjustBoard, Instant::now())?)
    }

    /// Let the board follow the surface again.
    pub fn replace_board(&mut self) -> Result<SessionState, SessionError> {
        Ok(self.fire(Trigger::ReplaceBoard, Instant::now())?)
    }

    /// Move/rotate the board. Scale in `transform` is ignored.
    pub fn move_board(&mut self, transform: Transform) -> Result<(), SessionError> {
        if !self.state.can_adjust_board() {
            return Err(SessionError::BoardLocked(self.state));
        }
        if !transform.is_finite() {
            return Err(SessionError::InvalidTransform);
        }
        self.board_pose = transform.normalized();
        Ok(())
    }

    /// Multiply the board scale by `factor`.
    pub fn scale_board(&mut self, factor: f32) -> Result<(), SessionError> {
        if !self.state.can_adjust_board() {
            return Err(SessionError::BoardLocked(self.state));
        }
        let scale = self.board_scale * factor;
        if !(factor.is_finite() && factor > 0.0 && scale.is_finite()) {
            return Err(SessionError::InvalidScale(factor));
        }
        self.board_scale = scale;
        Ok(())
    }

    /// Commit the board and move on to level setup.
    pub fn commit_board(&mut self) -> Result<SessionState, SessionError> {
        Ok(self.fire(Trigger::CommitBoard, Instant::now())?)
    }

    /// The AR session found the board anchor from the host's world map.
    pub fn board_anchor_recognized(&mut self) -> Result<SessionState, SessionError> {
        Ok(self.fire(Trigger::BoardAnchorRecognized, Instant::now())?)
    }

    /// Latest spatial map from the AR collaborator (host side).
    pub fn update_world_map(&mut self, map: Vec<u8>) {
        self.world_map = Some(map);
        self.invalidate_encoded_map();
        if !self.deferred_board_requests.is_empty() {
            self.ensure_encoding();
        }
    }

    /// Current board as a (possibly provisional) anchor.
    fn current_board(&self) -> BoardAnchor {
        BoardAnchor::from_scaled_transform(
            &self.board_pose.scaled(self.board_scale),
            self.config.board_aspect_ratio,
        )
    }

    // -------------------------------------------------------------------------
    // Frame
    // -------------------------------------------------------------------------

    /// Consume one AR frame.
    pub fn update_frame(&mut self, input: FrameInput) -> FrameOutput {
        self.frame += 1;
        self.camera_tx.send_replace(CameraSnapshot {
            frame: self.frame,
            transform: input.camera_transform,
            tracking: input.tracking,
        });

        let now = Instant::now();
        if self.state == SessionState::SetupLevel {
            let _ = self.fire(Trigger::LevelReady, now);
        } else if self.state.attempting_board_placement() && input.tracking == TrackingState::Normal {
            self.place_board(input.surface_hit, now);
        }

        self.frame_output()
    }

    fn place_board(&mut self, hit: Option<SurfaceHit>, now: Instant) {
        match hit {
            Some(hit) => {
                // Initial placement ignores hits too close to the camera.
                if hit.distance <= self.config.min_surface_distance
                    && self.state != SessionState::PlacingBoard
                {
                    return;
                }
                if self.fire(Trigger::SurfaceDetected, now).is_ok() {
                    self.board_pose = hit.transform.normalized();
                    self.board_placed = true;
                }
            }
            None => {
                let _ = self.fire(Trigger::SurfaceLost, now);
            }
        }
    }

    fn frame_output(&self) -> FrameOutput {
        let board_anchor = match self.board_anchor {
            Some(anchor) => Some(anchor),
            None if self.board_placed && self.state.can_adjust_board() => Some(self.current_board()),
            None => None,
        };
        FrameOutput {
            board_anchor,
            border_visible: self.border_visible,
        }
    }

    // -------------------------------------------------------------------------
    // Gameplay
    // -------------------------------------------------------------------------

    /// Submit a local action.
    ///
    /// Authorities queue it for the next tick. Clients send a request to the
    /// host; send failures are reported through the delegate.
    pub fn submit_action(&mut self, action: GameAction) -> Result<(), SessionError> {
        if self.host_left {
            return Err(SessionError::HostUnavailable);
        }
        if self.state != SessionState::GameInProgress {
            return Err(SessionError::GameNotInProgress(self.state));
        }

        match self.role {
            Role::Solo | Role::Host => {
                self.queued_actions.push_back(ActionEnvelope {
                    seq: 0,
                    origin: self.local.id,
                    action,
                });
            }
            Role::Client { host } => {
                if !action.is_requestable_by(&self.local.id) {
                    return Err(SessionError::NotPermitted(action.kind()));
                }
                let envelope = ActionEnvelope {
                    seq: self.broadcaster.next_seq(),
                    origin: self.local.id,
                    action,
                };
                debug!(seq = envelope.seq, kind = envelope.action.kind(), "requesting action");
                self.send(&host, &PeerMessage::ActionRequest(envelope), Instant::now());
            }
        }
        Ok(())
    }

    /// Run one logic tick now.
    pub fn tick(&mut self) -> TickReport {
        self.tick_at(Instant::now())
    }

    /// Run one logic tick at `now`.
    pub fn tick_at(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::default();

        // (a) Drain inbound. Inline decode/encode jobs land in the same queue
        // and are picked up by this loop.
        while let Some(event) = self.inbound.try_next() {
            report.events += 1;
            self.handle_event(event, now);
        }

        // (b), (c) Apply queued actions; authorities broadcast them.
        if self.state == SessionState::GameInProgress && !self.host_left {
            self.apply_queued(now, &mut report);
        }

        // (d) Notify.
        if report.state_changed {
            self.delegate.updated(self.store.current_state());
        }

        report.delay_changed = self.broadcaster.evaluate_delay(now);
        if let Some(delayed) = report.delay_changed {
            info!(delayed, "network delay changed");
            self.delegate.has_network_delay(delayed);
        }

        report
    }

    fn apply_queued(&mut self, now: Instant, report: &mut TickReport) {
        while let Some(mut envelope) = self.queued_actions.pop_front() {
            if self.role.is_authority() {
                envelope.seq = self.broadcaster.next_seq();
            } else if envelope.seq <= self.last_seq {
                debug!(seq = envelope.seq, last = self.last_seq, "skipping stale action");
                continue;
            }

            let delta = self.store.apply(&envelope.action);
            self.last_seq = envelope.seq;
            report.applied += 1;
            report.state_changed |= !delta.is_empty();

            if let Some(team) = delta.winner() {
                info!(?team, "game won");
                if self.store.current_state().team_of(&self.local.id) == Some(team) {
                    self.delegate.did_win_game(team);
                }
            }

            if self.role.is_authority() && !self.broadcaster.is_empty() {
                self.broadcast(&PeerMessage::Action(envelope), now);
                report.broadcast += 1;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Inbound
    // -------------------------------------------------------------------------

    fn handle_event(&mut self, event: InboundEvent, now: Instant) {
        match event {
            InboundEvent::PeerConnected(peer) => self.on_peer_connected(peer, now),
            InboundEvent::Message { from, bytes } => match PeerMessage::from_bytes(&bytes) {
                Ok(msg) => self.handle_message(from, msg, now),
                Err(e) => debug!(peer = %from, error = %e, "dropping malformed message"),
            },
            InboundEvent::PeerDisconnected(player) => self.on_peer_disconnected(player),
            InboundEvent::SnapshotDecoded { from, result } => {
                if self.state != SessionState::WaitingForBoard {
                    debug!(peer = %from, state = %self.state, "ignoring late world map");
                    return;
                }
                match result {
                    Ok(snapshot) => {
                        info!(
                            peer = %from,
                            map_bytes = snapshot.spatial_map().len(),
                            "world map loaded"
                        );
                        self.board_anchor = Some(snapshot.anchor());
                        self.received_snapshot = Some(snapshot);
                        let _ = self.fire(Trigger::WorldMapReceived, now);
                    }
                    Err(e) => {
                        error!(peer = %from, error = %e, "world map rejected");
                        self.delegate.alert(e.user_message());
                        let _ = self.fire(Trigger::WorldMapRejected, now);
                    }
                }
            }
            InboundEvent::SnapshotEncoded { generation, result } => {
                if generation != self.map_generation {
                    debug!(generation, current = self.map_generation, "dropping stale encode");
                    return;
                }
                self.encoding_in_flight = false;
                match result {
                    Ok(bytes) => {
                        debug!(bytes = bytes.len(), generation, "world map encoded");
                        self.encoded_map = Some(bytes);
                    }
                    Err(e) => error!(error = %e, "world map encoding failed"),
                }
                self.answer_deferred(now);
            }
        }
    }

    fn on_peer_connected(&mut self, peer: std::sync::Arc<dyn PeerSession>, now: Instant) {
        let player = peer.player().clone();
        if player.id == self.local.id {
            warn!("ignoring connection to self");
            return;
        }
        if self.role == Role::Solo {
            debug!(peer = %player.id, "solo session ignores peers");
            return;
        }

        self.broadcaster.add_peer(peer);
        self.players.insert(player.id, player.clone());

        match self.role {
            Role::Client { host } if host == player.id => {
                info!(host = %player.id, username = %player.username, "joined host");
                self.delegate.joining_host(&player);
                if self.state == SessionState::WaitingForBoard && !self.board_request_sent {
                    self.request_board_location(now);
                }
            }
            _ => {
                info!(peer = %player.id, username = %player.username, "player joined");
                self.delegate.joining_player(&player);
            }
        }
    }

    fn on_peer_disconnected(&mut self, player_id: PlayerId) {
        self.broadcaster.remove_peer(&player_id);
        self.deferred_board_requests.remove(&player_id);
        let Some(player) = self.players.remove(&player_id) else {
            debug!(peer = %player_id, "disconnect from unknown peer");
            return;
        };

        if self.is_host(&player_id) {
            self.on_host_left(&player);
            return;
        }
        info!(peer = %player_id, username = %player.username, "player left");
        self.delegate.leaving_player(&player);
    }

    fn on_host_left(&mut self, host: &Player) {
        if self.host_left {
            return;
        }
        self.host_left = true;
        let dropped = self.queued_actions.len();
        self.queued_actions.clear();
        warn!(host = %host.id, dropped, "host left the game");
        self.delegate.leaving_host(host);
        self.delegate.alert(HOST_LEFT_MESSAGE);
    }

    fn handle_message(&mut self, from: PlayerId, msg: PeerMessage, now: Instant) {
        let Some(sender) = self.players.get(&from).cloned() else {
            debug!(peer = %from, kind = msg.kind(), "message from unknown peer");
            return;
        };

        match msg {
            PeerMessage::Hello { .. } => {
                debug!(peer = %from, "ignoring repeated hello");
            }
            PeerMessage::BoardSetup(action) => {
                debug!(peer = %from, action = %action.describe(), "board setup message");
                self.delegate.received_board_action(&action, &sender);
                self.handle_board_action(from, action, now);
            }
            PeerMessage::Action(envelope) => {
                if !self.is_host(&from) {
                    debug!(peer = %from, "ignoring action from non-host");
                    return;
                }
                self.send(&from, &PeerMessage::Ack { seq: envelope.seq }, now);
                if self.host_left || self.state == SessionState::Setup {
                    debug!(seq = envelope.seq, state = %self.state, "ignoring action outside a game");
                    return;
                }
                if envelope.seq <= self.last_seq {
                    debug!(seq = envelope.seq, last = self.last_seq, "action covered by state sync");
                    return;
                }
                self.queued_actions.push_back(envelope);
            }
            PeerMessage::ActionRequest(envelope) => {
                if !self.role.is_authority() {
                    debug!(peer = %from, "ignoring action request, not the host");
                    return;
                }
                self.send(&from, &PeerMessage::Ack { seq: envelope.seq }, now);
                if self.state == SessionState::Setup {
                    debug!(peer = %from, seq = envelope.seq, "ignoring action request outside a game");
                    return;
                }
                if envelope.origin != from || !envelope.action.is_requestable_by(&from) {
                    warn!(peer = %from, kind = envelope.action.kind(), "refusing action request");
                    return;
                }
                self.queued_actions.push_back(envelope);
            }
            PeerMessage::StateSync { state, last_seq, state_hash } => {
                if !self.is_host(&from) {
                    debug!(peer = %from, "ignoring state sync from non-host");
                    return;
                }
                if state.compute_hash() != state_hash {
                    warn!(peer = %from, "state sync hash mismatch");
                    return;
                }
                info!(last_seq, hash = %short_hex(&state_hash), "state synchronized from host");
                self.store.restore(state);
                self.last_seq = last_seq;
                self.queued_actions.retain(|e| e.seq > last_seq);
                self.delegate.updated(self.store.current_state());
            }
            PeerMessage::Ack { seq } => {
                if let Some(rtt) = self.broadcaster.record_ack(&from, seq, now) {
                    debug!(peer = %from, seq, rtt_ms = rtt.as_millis() as u64, "ack received");
                }
            }
            PeerMessage::Leave => {
                info!(peer = %from, "peer left the game");
                self.on_peer_disconnected(from);
            }
        }
    }

    fn handle_board_action(&mut self, from: PlayerId, action: BoardSetupAction, now: Instant) {
        match action {
            BoardSetupAction::RequestBoardLocation => {
                if !self.role.is_authority() {
                    debug!(peer = %from, "ignoring board request, not the host");
                    return;
                }
                self.answer_board_request(from, now);
            }
            BoardSetupAction::BoardLocation(location) => {
                if !self.is_host(&from) {
                    debug!(peer = %from, "ignoring board location from non-host");
                    return;
                }
                if self.state != SessionState::WaitingForBoard {
                    debug!(state = %self.state, "ignoring board location, not waiting");
                    return;
                }
                match location {
                    GameBoardLocation::Manual => {
                        info!("host asked for manual board placement");
                        let _ = self.fire(Trigger::ManualPlacementReceived, now);
                    }
                    GameBoardLocation::WorldMapData(data) => {
                        info!(bytes = data.len(), "received world map");
                        self.inbound_tx.dispatch(move || InboundEvent::SnapshotDecoded {
                            from,
                            result: WorldSnapshotCodec::decode(&data),
                        });
                    }
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Board handoff
    // -------------------------------------------------------------------------

    fn request_board_location(&mut self, now: Instant) {
        let Role::Client { host } = self.role else {
            return;
        };
        if !self.broadcaster.contains(&host) {
            debug!("host not connected yet, board request deferred");
            return;
        }
        info!(host = %host, "requesting board location");
        self.board_request_sent = true;
        self.send(&host, &PeerMessage::BoardSetup(BoardSetupAction::RequestBoardLocation), now);
    }

    fn answer_board_request(&mut self, peer: PlayerId, now: Instant) {
        // Joiners start from the host's state; later actions carry higher seqs.
        if self.state == SessionState::GameInProgress {
            self.send_state_sync(&peer, now);
        }
        match self.config.board_locating_mode {
            BoardLocatingMode::Manual => {
                self.send_board_location(&peer, GameBoardLocation::Manual, now);
            }
            BoardLocatingMode::WorldMap => {
                if let Some(map) = self.encoded_map.clone() {
                    self.send_board_location(&peer, GameBoardLocation::WorldMapData(map), now);
                } else {
                    debug!(peer = %peer, "world map not ready, deferring board request");
                    self.deferred_board_requests.insert(peer);
                    self.ensure_encoding();
                }
            }
        }
    }

    fn answer_deferred(&mut self, now: Instant) {
        let waiting = std::mem::take(&mut self.deferred_board_requests);
        if waiting.is_empty() {
            return;
        }
        let location = match &self.encoded_map {
            Some(map) => GameBoardLocation::WorldMapData(map.clone()),
            None => {
                warn!(peers = waiting.len(), "no world map available, falling back to manual placement");
                GameBoardLocation::Manual
            }
        };
        for peer in waiting {
            self.send_board_location(&peer, location.clone(), now);
        }
    }

    fn send_board_location(&mut self, peer: &PlayerId, location: GameBoardLocation, now: Instant) {
        let msg = PeerMessage::BoardSetup(BoardSetupAction::BoardLocation(location));
        if let PeerMessage::BoardSetup(action) = &msg {
            info!(peer = %peer, action = %action.describe(), "sending board location");
        }
        self.send(peer, &msg, now);
    }

    fn invalidate_encoded_map(&mut self) {
        self.map_generation += 1;
        self.encoded_map = None;
        self.encoding_in_flight = false;
    }

    /// Start encoding the world map if anchor and map exist and no encode
    /// for the current generation is running.
    fn ensure_encoding(&mut self) {
        if self.encoded_map.is_some() || self.encoding_in_flight {
            return;
        }
        let (Some(anchor), Some(map)) = (self.board_anchor, self.world_map.clone()) else {
            return;
        };
        self.encoding_in_flight = true;
        let generation = self.map_generation;
        self.inbound_tx.dispatch(move || InboundEvent::SnapshotEncoded {
            generation,
            result: WorldSnapshotCodec::encode(&anchor, &map),
        });
    }

    fn send_state_sync(&mut self, peer: &PlayerId, now: Instant) {
        let state = self.store.current_state().clone();
        let state_hash = state.compute_hash();
        info!(peer = %peer, last_seq = self.last_seq, hash = %short_hex(&state_hash), "sending state sync");
        let msg = PeerMessage::StateSync {
            state,
            last_seq: self.last_seq,
            state_hash,
        };
        self.send(peer, &msg, now);
    }

    // -------------------------------------------------------------------------
    // State machine
    // -------------------------------------------------------------------------

    fn fire(&mut self, trigger: Trigger, now: Instant) -> Result<SessionState, TransitionError> {
        let t = match transition(self.state, &trigger) {
            Ok(t) => t,
            Err(e) => {
                debug!(error = %e, "transition rejected");
                return Err(e);
            }
        };

        let from = self.state;
        self.state = t.next;
        if from != t.next {
            info!(from = %from, to = %t.next, "session state changed");
            self.delegate.session_state_changed(from, t.next);
        }

        for effect in t.effects {
            self.run_effect(effect, now);
        }
        Ok(self.state)
    }

    fn run_effect(&mut self, effect: Effect, now: Instant) {
        match effect {
            Effect::RequestBoardLocation => self.request_board_location(now),
            Effect::HideBoardBorder => self.border_visible = false,
            Effect::ShowBoardBorder => self.border_visible = true,
            Effect::DiscardWorldMap => {
                self.received_snapshot = None;
                if !self.role.is_authority() {
                    self.board_anchor = None;
                }
            }
            Effect::FinalizeBoardAnchor => {
                if self.board_anchor.is_none() {
                    let anchor = self.current_board();
                    debug!(width = anchor.size.width, height = anchor.size.height, "board anchor finalized");
                    self.board_anchor = Some(anchor);
                    self.invalidate_encoded_map();
                }
                if !self.deferred_board_requests.is_empty() {
                    self.ensure_encoding();
                }
            }
            Effect::StartSimulation => {
                info!(role = ?self.role, "game started");
                self.delegate.did_start_game();
            }
            Effect::ReleaseLevel => self.release_level(now),
        }
    }

    fn release_level(&mut self, now: Instant) {
        let dropped = self.queued_actions.len();
        if dropped > 0 {
            debug!(dropped, "discarding queued actions");
        }
        self.queued_actions.clear();
        self.deferred_board_requests.clear();
        self.store = GameStateStore::new(
            GameState::new(self.config.catapults_per_team),
            self.config.entity_bounds(),
        );
        self.last_seq = 0;
        self.board_anchor = None;
        self.board_placed = false;
        self.board_pose = Transform::IDENTITY;
        self.board_scale = self.config.default_board_scale;
        self.board_request_sent = false;
        self.invalidate_encoded_map();
        self.leave_peers(now);
    }

    /// Tell every peer we are gone, then forget them along with sequence
    /// numbers and ack bookkeeping.
    fn leave_peers(&mut self, now: Instant) {
        if !self.broadcaster.is_empty() {
            info!(peers = self.broadcaster.len(), "leaving peers");
            self.broadcast(&PeerMessage::Leave, now);
        }
        let was_delayed = self.broadcaster.is_delayed();
        self.broadcaster = ActionBroadcaster::new(
            self.config.network_delay_threshold(),
            self.config.max_pending_acks,
        );
        self.players.clear();
        self.host_left = false;
        if was_delayed {
            self.delegate.has_network_delay(false);
        }
    }

    // -------------------------------------------------------------------------
    // Outbound
    // -------------------------------------------------------------------------

    fn is_host(&self, player: &PlayerId) -> bool {
        matches!(self.role, Role::Client { host } if host == *player)
    }

    fn send(&mut self, to: &PlayerId, msg: &PeerMessage, now: Instant) {
        match self.broadcaster.send_to(to, msg, now) {
            Ok(()) => {}
            Err(BroadcastError::Connection(e)) => self.on_send_failure(&e),
            Err(BroadcastError::Protocol(e)) => {
                error!(peer = %to, kind = msg.kind(), error = %e, "failed to encode message");
            }
        }
    }

    fn broadcast(&mut self, msg: &PeerMessage, now: Instant) {
        match self.broadcaster.broadcast(msg, now) {
            Ok(report) if report.all_delivered() => {}
            Ok(report) => {
                warn!(
                    kind = msg.kind(),
                    delivered = report.delivered.len(),
                    failed = report.failed.len(),
                    "broadcast partially failed"
                );
                for (_, e) in &report.failed {
                    self.on_send_failure(e);
                }
            }
            Err(e) => error!(kind = msg.kind(), error = %e, "failed to encode message"),
        }
    }

    fn on_send_failure(&mut self, e: &crate::network::peer::ConnectionError) {
        use crate::network::peer::ConnectionError;

        if let ConnectionError::PeerUnavailable(player) = e {
            // Gone for good; the disconnect event finishes the cleanup.
            self.broadcaster.remove_peer(player);
        }
        self.delegate.peer_unavailable(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::player::{CatapultId, Team};
    use crate::network::loopback;
    use crate::session::delegate::SessionEvent;
    use std::time::Duration;
    use tokio::sync::mpsc;

    type Events = mpsc::UnboundedReceiver<SessionEvent>;

    fn coordinator(local: Player, role: Role) -> (SessionCoordinator, Events) {
        coordinator_with(local, role, SessionConfig::default())
    }

    fn coordinator_with(local: Player, role: Role, config: SessionConfig) -> (SessionCoordinator, Events) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionCoordinator::new(local, role, config, Box::new(tx)), rx)
    }

    fn delay_events(events: &mut Events) -> Vec<bool> {
        std::iter::from_fn(|| events.try_recv().ok())
            .filter_map(|e| match e {
                SessionEvent::HasNetworkDelay(delayed) => Some(delayed),
                _ => None,
            })
            .collect()
    }

    fn hit(distance: f32) -> FrameInput {
        FrameInput {
            camera_transform: Transform::IDENTITY,
            tracking: TrackingState::Normal,
            surface_hit: Some(SurfaceHit {
                transform: Transform::from_translation([0.0, -0.5, -1.0]),
                distance,
            }),
        }
    }

    fn into_game(c: &mut SessionCoordinator) {
        c.begin().unwrap();
        c.update_frame(hit(1.0));
        c.commit_board().unwrap();
        c.update_frame(hit(1.0));
        assert_eq!(c.session_state(), SessionState::GameInProgress);
    }

    #[test]
    fn test_close_hits_ignored_for_initial_placement() {
        let (mut solo, _events) = coordinator(Player::new("Solo"), Role::Solo);
        solo.begin().unwrap();

        let out = solo.update_frame(hit(0.3));
        assert_eq!(solo.session_state(), SessionState::LookingForSurface);
        assert!(out.board_anchor.is_none());

        let out = solo.update_frame(hit(0.8));
        assert_eq!(solo.session_state(), SessionState::PlacingBoard);
        assert!(out.border_visible);
        assert!(out.board_anchor.is_some());

        // Once placing, close hits keep updating the board.
        solo.update_frame(hit(0.3));
        assert_eq!(solo.session_state(), SessionState::PlacingBoard);
    }

    #[test]
    fn test_limited_tracking_skips_placement() {
        let (mut solo, _events) = coordinator(Player::new("Solo"), Role::Solo);
        solo.begin().unwrap();
        let mut input = hit(1.0);
        input.tracking = TrackingState::Limited;
        solo.update_frame(input);
        assert_eq!(solo.session_state(), SessionState::LookingForSurface);
    }

    #[test]
    fn test_surface_lost_returns_to_search() {
        let (mut solo, _events) = coordinator(Player::new("Solo"), Role::Solo);
        solo.begin().unwrap();
        solo.update_frame(hit(1.0));
        let out = solo.update_frame(FrameInput { surface_hit: None, ..hit(1.0) });
        assert_eq!(solo.session_state(), SessionState::LookingForSurface);
        assert!(!out.border_visible);
    }

    #[test]
    fn test_board_gestures_only_while_adjustable() {
        let (mut solo, _events) = coordinator(Player::new("Solo"), Role::Solo);
        assert!(matches!(solo.scale_board(2.0), Err(SessionError::BoardLocked(SessionState::Setup))));

        solo.begin().unwrap();
        solo.update_frame(hit(1.0));
        solo.adjust_board().unwrap();
        solo.scale_board(2.0).unwrap();
        assert!(matches!(solo.scale_board(0.0), Err(SessionError::InvalidScale(_))));
        solo.move_board(Transform::from_translation([1.0, 0.0, 0.0]).scaled(3.0)).unwrap();
        solo.commit_board().unwrap();
        solo.update_frame(hit(1.0));

        let anchor = solo.board_anchor().unwrap();
        assert!((anchor.size.width - 2.0).abs() < 1e-5);
        assert!((anchor.size.height - 3.0).abs() < 1e-5);
        assert_eq!(anchor.transform.translation(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_non_finite_board_move_rejected() {
        let (mut solo, _events) = coordinator(Player::new("Solo"), Role::Solo);
        solo.begin().unwrap();
        solo.update_frame(hit(1.0));
        solo.adjust_board().unwrap();
        let before = solo.update_frame(hit(1.0)).board_anchor;

        let err = solo.move_board(Transform::from_translation([f32::NAN, 0.0, 0.0])).unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransform));
        assert!(matches!(
            solo.move_board(Transform::from_translation([0.0, f32::INFINITY, 0.0])),
            Err(SessionError::InvalidTransform)
        ));
        assert_eq!(solo.update_frame(hit(1.0)).board_anchor, before);

        solo.commit_board().unwrap();
        solo.update_frame(hit(1.0));
        assert!(solo.board_anchor().unwrap().is_valid());
    }

    #[test]
    fn test_camera_feed_gets_every_frame() {
        let (mut solo, _events) = coordinator(Player::new("Solo"), Role::Solo);
        let feed = solo.camera_feed();
        solo.update_frame(hit(1.0));
        solo.update_frame(hit(1.0));
        assert_eq!(feed.borrow().frame, 2);
    }

    #[test]
    fn test_solo_applies_on_tick() {
        let (mut solo, mut events) = coordinator(Player::new("Solo"), Role::Solo);
        let catapult = CatapultId::new(Team::A, 0);
        let me = solo.local_player().id;

        assert!(matches!(
            solo.submit_action(GameAction::GrabCatapult { player: me, catapult }),
            Err(SessionError::GameNotInProgress(SessionState::Setup))
        ));

        into_game(&mut solo);
        solo.submit_action(GameAction::GrabCatapult { player: me, catapult }).unwrap();
        assert_eq!(solo.game_state().held_by(&me), None, "not applied before the tick");

        let report = solo.tick();
        assert_eq!(report.applied, 1);
        assert!(report.state_changed);
        assert_eq!(solo.game_state().held_by(&me), Some(catapult));

        let mut saw_update = false;
        while let Ok(event) = events.try_recv() {
            saw_update |= matches!(event, SessionEvent::Updated(_));
        }
        assert!(saw_update);
    }

    #[test]
    fn test_local_team_win_reported() {
        let (mut solo, mut events) = coordinator(Player::new("Solo"), Role::Solo);
        let me = solo.local_player().id;
        into_game(&mut solo);
        solo.submit_action(GameAction::GrabCatapult { player: me, catapult: CatapultId::new(Team::B, 0) }).unwrap();
        for index in 0..3 {
            solo.submit_action(GameAction::KnockOutCatapult { catapult: CatapultId::new(Team::A, index) }).unwrap();
        }
        solo.tick();

        let won: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .filter_map(|e| match e {
                SessionEvent::DidWinGame(team) => Some(team),
                _ => None,
            })
            .collect();
        assert_eq!(won, vec![Team::B]);
    }

    #[test]
    fn test_exit_discards_queue_and_resets() {
        let (mut solo, _events) = coordinator(Player::new("Solo"), Role::Solo);
        into_game(&mut solo);
        solo.submit_action(GameAction::ResetWorld).unwrap();
        assert_eq!(solo.queued_actions(), 1);

        assert_eq!(solo.exit().unwrap(), SessionState::Setup);
        assert_eq!(solo.queued_actions(), 0);
        assert!(solo.board_anchor().is_none());
        assert!(solo.exit().is_err(), "exit from setup is not a transition");
    }

    #[test]
    fn test_client_cannot_advertise() {
        let (mut client, _events) = coordinator(
            Player::new("Bob"),
            Role::Client { host: PlayerId::new([1; 16]) },
        );
        assert!(matches!(client.advertise(None, 0), Err(SessionError::NotHost)));
    }

    #[test]
    fn test_advertise_and_relocate() {
        let (mut host, _events) = coordinator(Player::new("Alice"), Role::Host);
        let game = host.advertise(None, 2).unwrap();
        assert_eq!(game.name, "Alice's Game");
        assert_eq!(host.update_session_location(4).unwrap().location_id, 4);
    }

    #[test]
    fn test_client_requests_board_once_host_connects() {
        let alice = Player::new("Alice");
        let bob = Player::new("Bob");
        let (mut host, _host_events) = coordinator(alice.clone(), Role::Host);
        let (mut client, _client_events) = coordinator(bob.clone(), Role::Client { host: alice.id });

        host.begin().unwrap();
        client.begin().unwrap();
        assert_eq!(client.session_state(), SessionState::WaitingForBoard);

        let _link = loopback::connect(alice, &host.inbound_sender(), bob, &client.inbound_sender());
        client.tick();
        host.tick();

        // Host has no anchor yet: the request is parked until level setup.
        assert_eq!(host.deferred_board_requests.len(), 1);
    }

    /// Host and client connected while the host is still placing its board.
    fn parked_request(config: SessionConfig) -> (SessionCoordinator, SessionCoordinator, loopback::LoopbackLink) {
        let alice = Player::new("Alice");
        let bob = Player::new("Bob");
        let (mut host, _) = coordinator_with(alice.clone(), Role::Host, config.clone());
        let (mut client, _) = coordinator_with(bob.clone(), Role::Client { host: alice.id }, config);
        host.begin().unwrap();
        client.begin().unwrap();
        let link = loopback::connect(alice, &host.inbound_sender(), bob, &client.inbound_sender());
        client.tick();
        host.tick();
        assert_eq!(host.deferred_board_requests.len(), 1);

        host.update_world_map(vec![3u8; 512]);
        host.update_frame(hit(1.0));
        host.commit_board().unwrap();
        host.update_frame(hit(1.0));
        assert_eq!(host.session_state(), SessionState::GameInProgress);
        (host, client, link)
    }

    #[test]
    fn test_parked_request_answered_after_level_setup() {
        let (mut host, mut client, _link) = parked_request(SessionConfig::default());

        host.tick();
        assert!(host.deferred_board_requests.is_empty());
        assert!(host.encoded_map.is_some());

        client.tick();
        assert_eq!(client.session_state(), SessionState::LocalizingToBoard);
        assert_eq!(client.board_anchor(), host.board_anchor());
        assert_eq!(client.received_snapshot().map(|s| s.spatial_map().len()), Some(512));
    }

    #[test]
    fn test_parked_request_falls_back_to_manual_when_encoding_fails() {
        // Zero aspect ratio gives a board without height, which cannot be encoded.
        let config = SessionConfig { board_aspect_ratio: 0.0, ..Default::default() };
        let (mut host, mut client, _link) = parked_request(config);

        host.tick();
        assert!(host.deferred_board_requests.is_empty());
        assert!(host.encoded_map.is_none());

        client.tick();
        assert_eq!(client.session_state(), SessionState::LookingForSurface);
        assert!(client.received_snapshot().is_none());
        assert!(client.board_anchor().is_none());
    }

    #[test]
    fn test_network_delay_raised_and_cleared() {
        let alice = Player::new("Alice");
        let bob = Player::new("Bob");
        let (mut host, mut host_events) = coordinator(alice.clone(), Role::Host);
        let (mut client, _client_events) = coordinator(bob.clone(), Role::Client { host: alice.id });
        into_game(&mut host);
        client.begin().unwrap();
        let _link = loopback::connect(alice, &host.inbound_sender(), bob, &client.inbound_sender());

        let t0 = Instant::now();
        host.tick_at(t0);
        assert_eq!(host.peer_count(), 1);
        delay_events(&mut host_events);

        // Client does not tick, so the action stays unacknowledged.
        host.submit_action(GameAction::KnockOutCatapult { catapult: CatapultId::new(Team::B, 0) }).unwrap();
        assert_eq!(host.tick_at(t0).broadcast, 1);
        assert_eq!(host.tick_at(t0 + Duration::from_millis(200)).delay_changed, None);

        let report = host.tick_at(t0 + Duration::from_millis(300));
        assert_eq!(report.delay_changed, Some(true));
        assert!(host.has_network_delay());

        // The late ack keeps the flag up: its round trip is above the threshold.
        client.tick();
        assert_eq!(host.tick_at(t0 + Duration::from_millis(400)).delay_changed, None);
        assert_eq!(host.broadcaster.pending_acks(), 0);

        let t1 = t0 + Duration::from_secs(1);
        host.submit_action(GameAction::KnockOutCatapult { catapult: CatapultId::new(Team::B, 1) }).unwrap();
        host.tick_at(t1);
        client.tick();
        let report = host.tick_at(t1 + Duration::from_millis(10));
        assert_eq!(report.delay_changed, Some(false));
        assert!(!host.has_network_delay());
        assert_eq!(host.broadcaster.last_rtt(&client.local_player().id), Some(Duration::from_millis(10)));

        assert_eq!(delay_events(&mut host_events), vec![true, false]);
    }

    #[test]
    fn test_exit_drops_peers_and_restarts_sequence() {
        let alice = Player::new("Alice");
        let bob = Player::new("Bob");
        let (mut host, mut host_events) = coordinator(alice.clone(), Role::Host);
        let (mut client, _client_events) = coordinator(bob.clone(), Role::Client { host: alice.id });
        into_game(&mut host);
        client.begin().unwrap();
        let _link = loopback::connect(alice, &host.inbound_sender(), bob, &client.inbound_sender());

        let t0 = Instant::now();
        host.tick_at(t0);
        host.submit_action(GameAction::ResetWorld).unwrap();
        host.tick_at(t0);
        host.tick_at(t0 + Duration::from_secs(1));
        assert!(host.has_network_delay());

        host.exit().unwrap();
        assert_eq!(host.peer_count(), 0);
        assert!(host.players.is_empty());
        assert!(!host.has_network_delay());
        assert_eq!(host.broadcaster.pending_acks(), 0);
        assert_eq!(host.broadcaster.next_seq(), 1);
        assert_eq!(delay_events(&mut host_events), vec![true, false]);

        // The client's ack from the old game is dropped.
        client.tick();
        host.tick();
        assert_eq!(host.peer_count(), 0);
    }

    #[test]
    fn test_actions_outside_a_game_are_dropped() {
        let alice = Player::new("Alice");
        let bob = Player::new("Bob");
        let (mut host, _host_events) = coordinator(alice.clone(), Role::Host);
        let (client, _client_events) = coordinator(bob.clone(), Role::Client { host: alice.id });
        let link = loopback::connect(alice, &host.inbound_sender(), bob.clone(), &client.inbound_sender());

        let request = PeerMessage::ActionRequest(ActionEnvelope {
            seq: 1,
            origin: bob.id,
            action: GameAction::GrabCatapult { player: bob.id, catapult: CatapultId::new(Team::A, 0) },
        });
        link.b_side().send(&request.to_bytes().unwrap()).unwrap();
        host.tick();
        assert_eq!(host.session_state(), SessionState::Setup);
        assert_eq!(host.queued_actions(), 0);

        into_game(&mut host);
        assert_eq!(host.tick().applied, 0);
        assert_eq!(host.game_state().held_by(&bob.id), None);
    }

    #[test]
    fn test_client_refuses_foreign_actions() {
        let alice = Player::new("Alice");
        let (mut client, _events) = coordinator(Player::new("Bob"), Role::Client { host: alice.id });
        client.state = SessionState::GameInProgress;
        let err = client
            .submit_action(GameAction::GrabCatapult {
                player: alice.id,
                catapult: CatapultId::new(Team::A, 0),
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::NotPermitted("grab_catapult")));
    }
}
