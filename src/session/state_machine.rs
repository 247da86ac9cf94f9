//! Session State Machine
//!
//! The coarse lifecycle of a session as a plain value plus a pure transition
//! function. `transition` never performs side effects; it returns the next
//! state and the effects the coordinator must carry out.
//!
//! ```text
//!  host:   setup ─► lookingForSurface ─► placingBoard ⇄ adjustingBoard
//!                          ▲                  │              │
//!                          └── surface lost ──┘              │
//!                                              commit ─► setupLevel ─► gameInProgress
//!  client: setup ─► waitingForBoard ─► localizingToBoard ─► setupLevel
//!                          │  manual ─► lookingForSurface
//!                          └─ bad map ─► setup
//!  any state except setup ── exit ─► setup
//! ```

use std::fmt;
use thiserror::Error;

/// Lifecycle phase. Exactly one is active at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Not in a game.
    #[default]
    Setup,
    /// Scanning for a plane to put the board on.
    LookingForSurface,
    /// Board follows the surface under the camera.
    PlacingBoard,
    /// Board fixed in place; user scales/rotates/moves it.
    AdjustingBoard,
    /// Client waiting for the host to say where the board is.
    WaitingForBoard,
    /// Client relocalizing against the host's world map.
    LocalizingToBoard,
    /// Board known; level being set up.
    SetupLevel,
    /// Simulation running.
    GameInProgress,
}

impl SessionState {
    /// User-facing hint for this phase.
    pub fn localized_instruction(&self) -> Option<&'static str> {
        match self {
            SessionState::LookingForSurface => Some("Find a flat surface to place the game."),
            SessionState::PlacingBoard => Some("Scale, rotate or move the board."),
            SessionState::AdjustingBoard => Some("Make adjustments and tap to continue."),
            SessionState::GameInProgress => Some("Move closer to a slingshot."),
            SessionState::WaitingForBoard => Some("Synchronizing world map…"),
            SessionState::LocalizingToBoard => Some("Point the camera towards the table."),
            SessionState::Setup | SessionState::SetupLevel => None,
        }
    }

    /// Board gestures apply in this phase.
    pub fn can_adjust_board(&self) -> bool {
        matches!(self, SessionState::PlacingBoard | SessionState::AdjustingBoard)
    }

    /// Board follows surface hit tests in this phase.
    pub fn attempting_board_placement(&self) -> bool {
        matches!(self, SessionState::LookingForSurface | SessionState::PlacingBoard)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Setup => "setup",
            SessionState::LookingForSurface => "lookingForSurface",
            SessionState::PlacingBoard => "placingBoard",
            SessionState::AdjustingBoard => "adjustingBoard",
            SessionState::WaitingForBoard => "waitingForBoard",
            SessionState::LocalizingToBoard => "localizingToBoard",
            SessionState::SetupLevel => "setupLevel",
            SessionState::GameInProgress => "gameInProgress",
        };
        f.write_str(name)
    }
}

/// External signal that may move the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Start a game as host (or solo).
    HostGame,
    /// Join an existing host.
    JoinGame,
    /// Hit test found a usable plane.
    SurfaceDetected,
    /// Hit test found nothing.
    SurfaceLost,
    /// User confirmed the placement; switch to adjusting.
    AdjustBoard,
    /// User wants the board to follow the surface again.
    ReplaceBoard,
    /// User committed the board.
    CommitBoard,
    /// Host's world map arrived and decoded.
    WorldMapReceived,
    /// Host told us to place the board by hand.
    ManualPlacementReceived,
    /// Host's world map could not be loaded.
    WorldMapRejected,
    /// AR session recognized the board anchor from the world map.
    BoardAnchorRecognized,
    /// Level setup finished.
    LevelReady,
    /// Leave the game.
    Exit,
}

/// Side effect requested by a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Effect {
    /// Ask the host where the board is.
    RequestBoardLocation,
    /// Hide the board border.
    HideBoardBorder,
    /// Show the board border.
    ShowBoardBorder,
    /// Forget any received world map.
    DiscardWorldMap,
    /// Compute/register the authoritative board anchor.
    FinalizeBoardAnchor,
    /// Start the simulation tick.
    StartSimulation,
    /// Tear down the level and queued actions.
    ReleaseLevel,
}

/// Result of a valid transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    /// State to enter. May equal the current one.
    pub next: SessionState,
    /// Effects to perform, in order.
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: SessionState) -> Self {
        Self { next, effects: Vec::new() }
    }

    fn with(next: SessionState, effects: &[Effect]) -> Self {
        Self { next, effects: effects.to_vec() }
    }
}

/// Trigger not accepted in the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{trigger:?} is not valid in state {from}")]
pub struct TransitionError {
    /// State the trigger arrived in.
    pub from: SessionState,
    /// The rejected trigger.
    pub trigger: Trigger,
}

/// Compute the next state for `trigger` in `from`.
pub fn transition(from: SessionState, trigger: &Trigger) -> Result<Transition, TransitionError> {
    use Effect::*;
    use SessionState::*;

    let next = match (from, *trigger) {
        (Setup, Trigger::HostGame) => Transition::to(LookingForSurface),
        (Setup, Trigger::JoinGame) => Transition::with(WaitingForBoard, &[RequestBoardLocation]),

        (LookingForSurface, Trigger::SurfaceDetected) => {
            Transition::with(PlacingBoard, &[ShowBoardBorder])
        }
        (LookingForSurface, Trigger::SurfaceLost) => Transition::to(LookingForSurface),
        (PlacingBoard, Trigger::SurfaceDetected) => Transition::to(PlacingBoard),
        (PlacingBoard, Trigger::SurfaceLost) => {
            Transition::with(LookingForSurface, &[HideBoardBorder])
        }

        (PlacingBoard, Trigger::AdjustBoard) => Transition::to(AdjustingBoard),
        (AdjustingBoard, Trigger::ReplaceBoard) => Transition::to(PlacingBoard),
        (PlacingBoard | AdjustingBoard, Trigger::CommitBoard) => {
            Transition::with(SetupLevel, &[HideBoardBorder])
        }

        (WaitingForBoard, Trigger::WorldMapReceived) => {
            Transition::with(LocalizingToBoard, &[HideBoardBorder])
        }
        (WaitingForBoard, Trigger::ManualPlacementReceived) => Transition::to(LookingForSurface),
        (WaitingForBoard, Trigger::WorldMapRejected) => {
            Transition::with(Setup, &[DiscardWorldMap])
        }
        (LocalizingToBoard, Trigger::BoardAnchorRecognized) => Transition::to(SetupLevel),

        (SetupLevel, Trigger::LevelReady) => Transition::with(
            GameInProgress,
            &[FinalizeBoardAnchor, HideBoardBorder, StartSimulation],
        ),

        (state, Trigger::Exit) if state != Setup => {
            Transition::with(Setup, &[ReleaseLevel, DiscardWorldMap])
        }

        (from, trigger) => return Err(TransitionError { from, trigger }),
    };

    Ok(next)
}
