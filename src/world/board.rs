//! Board Anchor and Board Setup Messages
//!
//! The board anchor pins the game table in shared space. Joining clients ask
//! the host where the board is; the host answers with a world map carrying the
//! anchor, or tells the client to place the board by hand.

use serde::{Serialize, Deserialize};
use crate::core::transform::{BoardSize, Transform};

/// Spatial anchor for the game board.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardAnchor {
    /// Board pose with scale removed.
    pub transform: Transform,
    /// Board extent; carries the scale the transform dropped.
    pub size: BoardSize,
}

impl BoardAnchor {
    /// Create an anchor.
    pub fn new(transform: Transform, size: BoardSize) -> Self {
        Self { transform, size }
    }

    /// Build an anchor from a scaled board transform.
    ///
    /// Width follows the transform's x scale, height applies `aspect_ratio`.
    pub fn from_scaled_transform(transform: &Transform, aspect_ratio: f32) -> Self {
        let width = transform.scale_x();
        Self {
            transform: transform.normalized(),
            size: BoardSize::new(width, width * aspect_ratio),
        }
    }

    /// Check the anchor is usable: finite transform and positive size.
    pub fn is_valid(&self) -> bool {
        self.transform.is_finite() && self.size.is_valid()
    }
}

/// How a joining client learns where the board is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameBoardLocation {
    /// Compressed world snapshot carrying the board anchor.
    WorldMapData(Vec<u8>),
    /// No map; the client finds the surface on its own.
    Manual,
}

/// Board setup messages exchanged before play.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BoardSetupAction {
    /// Client → host: where is the board?
    RequestBoardLocation,
    /// Host → client: here is the board.
    BoardLocation(GameBoardLocation),
}

impl BoardSetupAction {
    /// Short description for logging (never includes map bytes).
    pub fn describe(&self) -> String {
        match self {
            BoardSetupAction::RequestBoardLocation => "request_board_location".to_string(),
            BoardSetupAction::BoardLocation(GameBoardLocation::Manual) => {
                "board_location(manual)".to_string()
            }
            BoardSetupAction::BoardLocation(GameBoardLocation::WorldMapData(data)) => {
                format!("board_location(world_map, {} bytes)", data.len())
            }
        }
    }
}
